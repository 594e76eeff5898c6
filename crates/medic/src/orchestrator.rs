//! Top-level remediation state machine.
//!
//! Composes the session store, investigation driver, response parser,
//! execution policy, and command runner into one entry point:
//! issue in, structured response document out. After a fully successful
//! execution it re-investigates exactly once to confirm the fix, with an
//! explicit depth guard making the single-level invariant enforceable.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use runner::{execute_batch, BatchReport, CommandRunner, ExecutionResult};

use crate::analysis::{Analysis, IssueStatus, RemediationPlan, RiskLevel};
use crate::config::MedicConfig;
use crate::decision::{decide, ExecutionMode};
use crate::diagnostics::{diagnostic_tools, DiagnosticExecutor};
use crate::errors::{MedicError, MedicResult};
use crate::investigation::{InvestigationDriver, InvestigationReport};
use crate::parser::parse_analysis;
use crate::prompts::build_validation_issue;
use crate::session::{Session, SessionStatus, SessionStore, SessionUpdate};

/// The validation pass never spawns another validation pass.
const MAX_VALIDATION_DEPTH: u32 = 1;

/// Approval choice: the engine runs the commands itself.
const CHOICE_EXECUTE_NOW: u8 = 1;

/// Approval choice: the calling agent runs the commands.
const CHOICE_EXECUTE_VIA_AGENT: u8 = 2;

/// Request accepted by the engine entry point.
///
/// `issue` opens a fresh session; `execute_choice` + `session_id` continue
/// a prior one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediateRequest {
    pub issue: Option<String>,
    pub mode: Option<ExecutionMode>,
    pub confidence_threshold: Option<f64>,
    pub max_risk_level: Option<RiskLevel>,
    pub execute_choice: Option<u8>,
    pub session_id: Option<String>,
    pub executed_commands: Option<Vec<String>>,
}

/// Top-level engine.
pub struct RemediationOrchestrator {
    store: Arc<dyn SessionStore>,
    driver: InvestigationDriver,
    runner: Arc<dyn CommandRunner>,
    config: MedicConfig,
}

impl RemediationOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn crate::ai::AIProvider>,
        diagnostics: Arc<dyn DiagnosticExecutor>,
        runner: Arc<dyn CommandRunner>,
        config: MedicConfig,
    ) -> Self {
        let driver = InvestigationDriver::new(
            provider,
            diagnostics,
            diagnostic_tools(),
            config.model.clone(),
            config.max_iterations,
        );
        Self {
            store,
            driver,
            runner,
            config,
        }
    }

    /// Engine entry point.
    pub async fn handle(&self, request: RemediateRequest) -> MedicResult<Value> {
        if let Some(choice) = request.execute_choice {
            let session_id =
                request
                    .session_id
                    .as_deref()
                    .ok_or_else(|| MedicError::Validation {
                        reason: "executeChoice requires a sessionId".to_string(),
                    })?;
            return self
                .execute_approved(session_id, choice, request.executed_commands)
                .await;
        }

        let issue = request
            .issue
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MedicError::Validation {
                reason: "issue is required unless executeChoice and sessionId continue a \
                         prior session"
                    .to_string(),
            })?;

        let threshold = request
            .confidence_threshold
            .unwrap_or(self.config.confidence_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MedicError::Validation {
                reason: format!("confidenceThreshold {threshold} is outside [0, 1]"),
            });
        }

        let mode = request.mode.unwrap_or(ExecutionMode::Manual);
        let max_risk = request.max_risk_level.unwrap_or(self.config.max_risk);

        self.remediate(issue, mode, threshold, max_risk, 0).await
    }

    /// Mark a session `cancelled`. Only a session pending approval can be
    /// cancelled; running phases are never interrupted.
    pub async fn cancel(&self, session_id: &str) -> MedicResult<Value> {
        let session = self.store.read(session_id).await?;
        if session.status != SessionStatus::AnalysisComplete {
            return Err(MedicError::Validation {
                reason: format!(
                    "Session '{session_id}' is not pending approval (status: {})",
                    session.status
                ),
            });
        }
        self.store
            .update(
                session_id,
                SessionUpdate {
                    status: Some(SessionStatus::Cancelled),
                    ..SessionUpdate::default()
                },
            )
            .await?;
        info!(session_id = %session_id, "Session cancelled");
        Ok(json!({
            "sessionId": session_id,
            "status": "cancelled",
            "message": "Remediation cancelled; no commands were executed.",
        }))
    }

    /// One remediation cycle: investigate, analyze, gate, maybe execute.
    async fn remediate(
        &self,
        issue: &str,
        mode: ExecutionMode,
        threshold: f64,
        max_risk: RiskLevel,
        depth: u32,
    ) -> MedicResult<Value> {
        let session = Session::new(issue, mode);
        let session_id = session.session_id.clone();
        self.store.create(&session).await?;

        info!(session_id = %session_id, mode = %mode, depth, "Starting investigation");

        let report = match self.driver.run(issue).await {
            Ok(report) => report,
            Err(e) => {
                self.mark_failed(&session_id).await;
                return Err(e);
            }
        };

        let analysis = match parse_analysis(&report.final_message) {
            Ok(analysis) => analysis,
            Err(e) => {
                self.mark_failed(&session_id).await;
                return Err(e);
            }
        };

        self.store
            .update(
                &session_id,
                SessionUpdate {
                    status: Some(SessionStatus::AnalysisComplete),
                    final_analysis: Some(analysis.clone()),
                    ..SessionUpdate::default()
                },
            )
            .await?;

        info!(
            session_id = %session_id,
            issue_status = ?analysis.issue_status,
            confidence = analysis.confidence,
            risk = %analysis.remediation.risk,
            "Analysis complete"
        );

        let mut response = json!({
            "sessionId": &session_id,
            "investigation": investigation_json(&report),
            "analysis": analysis_json(&analysis),
            "remediation": remediation_json(&analysis.remediation),
        });

        // Nothing to execute: the symptom is gone or was never there.
        match analysis.issue_status {
            IssueStatus::Resolved => {
                response["status"] = json!("success");
                response["message"] = json!(
                    "The reported issue has already resolved itself; nothing to execute."
                );
                return Ok(response);
            }
            IssueStatus::NonExistent => {
                response["status"] = json!("success");
                response["message"] =
                    json!("No evidence of the reported issue was found; nothing to execute.");
                return Ok(response);
            }
            IssueStatus::Active => {}
        }

        // The validation pass only reports; it never executes, which is
        // what keeps the recursion single-level.
        if depth >= MAX_VALIDATION_DEPTH {
            response["status"] = json!("success");
            response["message"] =
                json!("The issue is still active after remediation; see the analysis.");
            return Ok(response);
        }

        let decision = decide(
            mode,
            analysis.confidence,
            analysis.remediation.risk,
            threshold,
            max_risk,
        );

        if !decision.should_execute {
            response["status"] = json!(decision.final_status);
            response["executed"] = json!(false);
            if let Some(fallback) = &decision.fallback_reason {
                response["fallbackReason"] = json!(fallback);
                response["guidance"] = json!(
                    "Lower confidenceThreshold or raise maxRiskLevel to allow unattended \
                     execution, or approve the plan manually with executeChoice."
                );
            } else {
                response["executionChoices"] = json!(execution_choices(&analysis.remediation));
                response["guidance"] = json!(
                    "Review the proposed actions, then call again with this sessionId and \
                     executeChoice: 1 to execute now, 2 to run the commands yourself."
                );
            }
            return Ok(response);
        }

        let commands = analysis.remediation.commands();
        let batch = execute_batch(self.runner.as_ref(), &commands).await;
        self.record_execution(response, &session_id, &analysis, batch, threshold, max_risk, depth)
            .await
    }

    /// Continue a session that was left pending approval.
    async fn execute_approved(
        &self,
        session_id: &str,
        choice: u8,
        executed_commands: Option<Vec<String>>,
    ) -> MedicResult<Value> {
        if choice != CHOICE_EXECUTE_NOW && choice != CHOICE_EXECUTE_VIA_AGENT {
            return Err(MedicError::Validation {
                reason: format!("executeChoice must be 1 or 2, got {choice}"),
            });
        }

        let session = self.store.read(session_id).await?;
        if session.status != SessionStatus::AnalysisComplete {
            return Err(MedicError::Validation {
                reason: format!(
                    "Session '{session_id}' is not awaiting approval (status: {})",
                    session.status
                ),
            });
        }
        let analysis = session
            .final_analysis
            .clone()
            .ok_or_else(|| MedicError::Internal {
                reason: format!("Session '{session_id}' has no stored analysis"),
            })?;

        let response = json!({
            "sessionId": &session.session_id,
            "analysis": analysis_json(&analysis),
            "remediation": remediation_json(&analysis.remediation),
        });

        if choice == CHOICE_EXECUTE_NOW {
            let commands = executed_commands.unwrap_or_else(|| analysis.remediation.commands());
            info!(session_id = %session_id, commands = commands.len(), "Approved execution");
            let batch = execute_batch(self.runner.as_ref(), &commands).await;
            return self
                .record_execution(
                    response,
                    session_id,
                    &analysis,
                    batch,
                    self.config.confidence_threshold,
                    self.config.max_risk,
                    0,
                )
                .await;
        }

        // Choice 2: the calling agent executes. Without a report of what
        // ran, hand back the commands; with one, record the outcome.
        match executed_commands {
            None => {
                let commands: Vec<String> = analysis
                    .remediation
                    .commands()
                    .iter()
                    .map(|c| runner::normalize_command(c))
                    .collect();
                let mut response = response;
                response["status"] = json!("delegated");
                response["executed"] = json!(false);
                response["commands"] = json!(commands);
                response["guidance"] = json!(
                    "Run the commands in order, then call again with this sessionId, \
                     executeChoice: 2, and executedCommands listing what was run."
                );
                Ok(response)
            }
            Some(commands) => {
                info!(
                    session_id = %session_id,
                    commands = commands.len(),
                    "Recording caller-side execution"
                );
                let results: Vec<ExecutionResult> = commands
                    .iter()
                    .map(|c| ExecutionResult {
                        action: runner::normalize_command(c),
                        success: true,
                        output: Some("reported executed by calling agent".to_string()),
                        error: None,
                        timestamp: chrono::Utc::now(),
                    })
                    .collect();
                let batch = BatchReport {
                    overall_success: results.iter().all(|r| r.success),
                    results,
                };
                self.record_execution(
                    response,
                    session_id,
                    &analysis,
                    batch,
                    self.config.confidence_threshold,
                    self.config.max_risk,
                    0,
                )
                .await
            }
        }
    }

    /// Persist an execution outcome, annotate the response, and run the
    /// single-level validation pass when the fix fully landed.
    #[allow(clippy::too_many_arguments)]
    async fn record_execution(
        &self,
        mut response: Value,
        session_id: &str,
        analysis: &Analysis,
        batch: BatchReport,
        threshold: f64,
        max_risk: RiskLevel,
        depth: u32,
    ) -> MedicResult<Value> {
        let status = if batch.overall_success {
            SessionStatus::ExecutedSuccessfully
        } else {
            SessionStatus::ExecutedWithErrors
        };
        self.store
            .update(
                session_id,
                SessionUpdate {
                    status: Some(status),
                    execution_results: Some(batch.results.clone()),
                    ..SessionUpdate::default()
                },
            )
            .await?;

        let total = batch.results.len();
        let failed = batch.results.iter().filter(|r| !r.success).count();
        response["status"] = json!(status.as_str());
        response["executed"] = json!(true);
        response["overallSuccess"] = json!(batch.overall_success);
        response["results"] = json!(&batch.results);
        response["message"] = if batch.overall_success {
            json!(format!("All {total} remediation command(s) executed successfully."))
        } else {
            json!(format!(
                "{failed} of {total} remediation command(s) failed; see results for details."
            ))
        };

        if batch.overall_success && depth < MAX_VALIDATION_DEPTH {
            if let Some(intent) = &analysis.validation_intent {
                let validation_issue =
                    build_validation_issue(intent, &analysis.remediation.summary);
                info!(session_id = %session_id, "Running post-fix validation pass");
                let inner = Box::pin(self.remediate(
                    &validation_issue,
                    ExecutionMode::Manual,
                    threshold,
                    max_risk,
                    depth + 1,
                ))
                .await;
                match inner {
                    Ok(inner) => {
                        let still_active = inner
                            .pointer("/analysis/issueStatus")
                            .and_then(Value::as_str)
                            == Some("active");
                        response["validation"] = json!({
                            "sessionId": inner.get("sessionId").cloned().unwrap_or(Value::Null),
                            "status": inner.get("status").cloned().unwrap_or(Value::Null),
                            "analysis": inner.get("analysis").cloned().unwrap_or(Value::Null),
                            "message": inner.get("message").cloned().unwrap_or(Value::Null),
                        });
                        if still_active {
                            warn!(session_id = %session_id, "Symptom persists after remediation");
                            response["guidance"] = json!(
                                "The fix executed but the symptom persists; review the \
                                 validation analysis and open a fresh session if needed."
                            );
                        }
                    }
                    // A failed validation pass does not undo a successful
                    // execution; surface it alongside the result.
                    Err(e) => {
                        error!(session_id = %session_id, error = %e, "Validation pass failed");
                        response["validation"] = json!({ "error": e.to_string() });
                    }
                }
            }
        }

        Ok(response)
    }

    async fn mark_failed(&self, session_id: &str) {
        let update = SessionUpdate {
            status: Some(SessionStatus::Failed),
            ..SessionUpdate::default()
        };
        if let Err(e) = self.store.update(session_id, update).await {
            error!(session_id = %session_id, error = %e, "Could not mark session failed");
        }
    }
}

fn investigation_json(report: &InvestigationReport) -> Value {
    let gathered: Vec<&str> = report.tool_calls.iter().map(|c| c.tool.as_str()).collect();
    json!({
        "iterations": report.iterations,
        "dataGathered": gathered,
    })
}

fn analysis_json(analysis: &Analysis) -> Value {
    json!({
        "issueStatus": analysis.issue_status,
        "rootCause": &analysis.root_cause,
        "confidence": analysis.confidence,
        "factors": &analysis.factors,
    })
}

fn remediation_json(plan: &RemediationPlan) -> Value {
    json!({
        "summary": &plan.summary,
        "actions": &plan.actions,
        "risk": plan.risk,
    })
}

fn execution_choices(plan: &RemediationPlan) -> Value {
    let count = plan.commands().len();
    json!([
        {
            "id": CHOICE_EXECUTE_NOW,
            "label": "Execute now",
            "description": format!("Run the {count} proposed command(s) through the engine's shell runner"),
            "risk": plan.risk,
        },
        {
            "id": CHOICE_EXECUTE_VIA_AGENT,
            "label": "Execute via the calling agent",
            "description": "Return the commands for the calling agent to run itself",
            "risk": plan.risk,
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{
        AIProvider, ChatMessage, ChatOptions, ChatResponse, ContentBlock, StopReason, TokenUsage,
        ToolSpec,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::session::FileSessionStore;

    struct ScriptedProvider {
        turns: Mutex<Vec<ChatResponse>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<ChatResponse>) -> Self {
            Self {
                turns: Mutex::new(turns),
            }
        }
    }

    #[async_trait]
    impl AIProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn chat(
            &self,
            _system: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
            _options: &ChatOptions,
        ) -> MedicResult<ChatResponse> {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                Err(MedicError::AiService {
                    reason: "script exhausted".to_string(),
                })
            } else {
                Ok(turns.remove(0))
            }
        }
    }

    struct NoopDiagnostics;

    #[async_trait]
    impl DiagnosticExecutor for NoopDiagnostics {
        async fn execute(&self, _tool: &str, _args: &Value) -> MedicResult<String> {
            Ok("ok".to_string())
        }
    }

    struct RecordingRunner {
        seen: Arc<Mutex<Vec<String>>>,
        fail_containing: Option<String>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                seen: Arc::new(Mutex::new(Vec::new())),
                fail_containing: None,
            }
        }

        fn failing_on(marker: &str) -> Self {
            Self {
                seen: Arc::new(Mutex::new(Vec::new())),
                fail_containing: Some(marker.to_string()),
            }
        }

        fn log(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.seen)
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run_command(&self, command: &str) -> runner::RunnerResult<String> {
            self.seen.lock().unwrap().push(command.to_string());
            if let Some(marker) = &self.fail_containing {
                if command.contains(marker.as_str()) {
                    return Err(runner::RunnerError::NonZeroExit {
                        code: 1,
                        stderr: "command failed".to_string(),
                    });
                }
            }
            Ok("done".to_string())
        }
    }

    fn text_turn(text: String) -> ChatResponse {
        ChatResponse {
            content: vec![ContentBlock::Text { text }],
            stop_reason: StopReason::EndTurn,
            model: "scripted".to_string(),
            usage: TokenUsage::default(),
        }
    }

    fn analysis_message(
        issue_status: &str,
        confidence: f64,
        risk: &str,
        with_intent: bool,
    ) -> String {
        let mut analysis = serde_json::json!({
            "issueStatus": issue_status,
            "rootCause": "deployment web has a bad image tag",
            "confidence": confidence,
            "factors": ["ImagePullBackOff on all web pods"],
            "remediation": {
                "summary": "Roll back to the previous image",
                "actions": [{
                    "description": "Undo the last rollout",
                    "command": "kubectl rollout undo deployment/web -n prod",
                    "risk": risk,
                    "rationale": "previous revision was healthy"
                }],
                "risk": risk
            }
        });
        if with_intent {
            analysis["validationIntent"] =
                serde_json::json!("confirm web pods reach Running state");
        }
        format!("Here is my conclusion:\n{analysis}")
    }

    struct Harness {
        _temp: TempDir,
        store: Arc<FileSessionStore>,
        orchestrator: RemediationOrchestrator,
        runner_log: Arc<Mutex<Vec<String>>>,
    }

    fn harness(turns: Vec<ChatResponse>, runner: RecordingRunner) -> Harness {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FileSessionStore::new(temp.path()));
        let runner_log = runner.log();
        let orchestrator = RemediationOrchestrator::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::new(ScriptedProvider::new(turns)),
            Arc::new(NoopDiagnostics),
            Arc::new(runner),
            MedicConfig::default(),
        );
        Harness {
            _temp: temp,
            store,
            orchestrator,
            runner_log,
        }
    }

    fn issue_request(issue: &str, mode: ExecutionMode) -> RemediateRequest {
        RemediateRequest {
            issue: Some(issue.to_string()),
            mode: Some(mode),
            ..RemediateRequest::default()
        }
    }

    #[tokio::test]
    async fn test_missing_issue_is_a_validation_error() {
        let h = harness(vec![], RecordingRunner::new());
        let err = h
            .orchestrator
            .handle(RemediateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MedicError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_manual_mode_waits_with_two_choices() {
        let h = harness(
            vec![text_turn(analysis_message("active", 0.95, "low", false))],
            RecordingRunner::new(),
        );
        let response = h
            .orchestrator
            .handle(issue_request("pod X is CrashLooping", ExecutionMode::Manual))
            .await
            .unwrap();

        assert_eq!(response["status"], "awaiting_user_approval");
        assert_eq!(response["executionChoices"].as_array().unwrap().len(), 2);
        assert_eq!(response["executed"], false);
        // Nothing ran
        assert!(h.runner_log.lock().unwrap().is_empty());

        // Session is parked at analysis_complete
        let session_id = response["sessionId"].as_str().unwrap();
        let session = h.store.read(session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::AnalysisComplete);
        assert!(session.final_analysis.is_some());
    }

    #[tokio::test]
    async fn test_automatic_executes_and_validates() {
        // First turn: active analysis with validation intent.
        // Second turn: the validation pass finds the issue resolved.
        let h = harness(
            vec![
                text_turn(analysis_message("active", 0.92, "low", true)),
                text_turn(analysis_message("resolved", 0.9, "low", false)),
            ],
            RecordingRunner::new(),
        );
        let response = h
            .orchestrator
            .handle(issue_request("web deployment down", ExecutionMode::Automatic))
            .await
            .unwrap();

        assert_eq!(response["status"], "executed_successfully");
        assert_eq!(response["executed"], true);
        assert_eq!(response["overallSuccess"], true);
        assert_eq!(
            h.runner_log.lock().unwrap().as_slice(),
            ["kubectl rollout undo deployment/web -n prod"]
        );

        // Validation pass ran in a fresh session and is embedded
        let validation = &response["validation"];
        assert_eq!(validation["analysis"]["issueStatus"], "resolved");
        assert_ne!(validation["sessionId"], response["sessionId"]);
    }

    #[tokio::test]
    async fn test_low_confidence_skips_with_fallback_reason() {
        let h = harness(
            vec![text_turn(analysis_message("active", 0.5, "low", false))],
            RecordingRunner::new(),
        );
        let response = h
            .orchestrator
            .handle(issue_request("flaky service", ExecutionMode::Automatic))
            .await
            .unwrap();

        assert_eq!(response["status"], "success");
        assert_eq!(response["executed"], false);
        let fallback = response["fallbackReason"].as_str().unwrap();
        assert!(fallback.contains("0.50"));
        assert!(fallback.contains("0.80"));
        assert!(h.runner_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_risk_exceeded_skips() {
        let h = harness(
            vec![text_turn(analysis_message("active", 0.95, "high", false))],
            RecordingRunner::new(),
        );
        let response = h
            .orchestrator
            .handle(issue_request("node issue", ExecutionMode::Automatic))
            .await
            .unwrap();

        assert_eq!(response["executed"], false);
        assert!(response["fallbackReason"]
            .as_str()
            .unwrap()
            .contains("high"));
    }

    #[tokio::test]
    async fn test_resolved_issue_short_circuits() {
        let h = harness(
            vec![text_turn(analysis_message("resolved", 0.9, "low", false))],
            RecordingRunner::new(),
        );
        let response = h
            .orchestrator
            .handle(issue_request("was it down?", ExecutionMode::Automatic))
            .await
            .unwrap();

        assert_eq!(response["status"], "success");
        assert!(response.get("executionChoices").is_none());
        assert!(response.get("fallbackReason").is_none());
        assert!(h.runner_log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_marks_session_failed() {
        let h = harness(
            vec![text_turn("I could not reach a conclusion.".to_string())],
            RecordingRunner::new(),
        );
        let err = h
            .orchestrator
            .handle(issue_request("mystery", ExecutionMode::Manual))
            .await
            .unwrap_err();
        assert!(matches!(err, MedicError::ResponseParse { .. }));

        // The only session on disk is marked failed
        let entries: Vec<_> = std::fs::read_dir(h.store.dir())
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(entries.len(), 1);
        let session: Session =
            serde_json::from_str(&std::fs::read_to_string(entries[0].path()).unwrap()).unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_partial_command_failure_reports_errors() {
        let message = {
            let analysis = serde_json::json!({
                "issueStatus": "active",
                "rootCause": "two independent problems",
                "confidence": 0.95,
                "factors": ["evidence"],
                "remediation": {
                    "summary": "apply both fixes",
                    "actions": [
                        {"description": "fix one", "command": "echo one",
                         "risk": "low", "rationale": "first"},
                        {"description": "fix two", "command": "bad-fix",
                         "risk": "low", "rationale": "second"},
                        {"description": "fix three", "command": "echo three",
                         "risk": "low", "rationale": "third"}
                    ],
                    "risk": "low"
                }
            });
            format!("{analysis}")
        };
        let h = harness(
            vec![text_turn(message)],
            RecordingRunner::failing_on("bad-fix"),
        );
        let response = h
            .orchestrator
            .handle(issue_request("double trouble", ExecutionMode::Automatic))
            .await
            .unwrap();

        assert_eq!(response["status"], "executed_with_errors");
        assert_eq!(response["overallSuccess"], false);
        let results = response["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1]["success"], false);
        // Later command still ran
        assert_eq!(results[2]["success"], true);
        // No validation pass after a partial failure
        assert!(response.get("validation").is_none());
    }

    #[tokio::test]
    async fn test_approved_execution_runs_stored_plan() {
        let h = harness(
            vec![text_turn(analysis_message("active", 0.9, "medium", false))],
            RecordingRunner::new(),
        );
        let first = h
            .orchestrator
            .handle(issue_request("needs approval", ExecutionMode::Manual))
            .await
            .unwrap();
        let session_id = first["sessionId"].as_str().unwrap().to_string();

        let second = h
            .orchestrator
            .handle(RemediateRequest {
                execute_choice: Some(1),
                session_id: Some(session_id.clone()),
                ..RemediateRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(second["status"], "executed_successfully");
        assert_eq!(
            h.runner_log.lock().unwrap().as_slice(),
            ["kubectl rollout undo deployment/web -n prod"]
        );
        let session = h.store.read(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::ExecutedSuccessfully);
    }

    #[tokio::test]
    async fn test_delegated_choice_returns_commands() {
        let h = harness(
            vec![text_turn(analysis_message("active", 0.9, "low", false))],
            RecordingRunner::new(),
        );
        let first = h
            .orchestrator
            .handle(issue_request("delegate me", ExecutionMode::Manual))
            .await
            .unwrap();
        let session_id = first["sessionId"].as_str().unwrap().to_string();

        let second = h
            .orchestrator
            .handle(RemediateRequest {
                execute_choice: Some(2),
                session_id: Some(session_id.clone()),
                ..RemediateRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(second["status"], "delegated");
        assert_eq!(
            second["commands"][0],
            "kubectl rollout undo deployment/web -n prod"
        );
        assert!(h.runner_log.lock().unwrap().is_empty());
        // Session still parked until the agent reports back
        let session = h.store.read(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::AnalysisComplete);
    }

    #[tokio::test]
    async fn test_invalid_choice_rejected() {
        let h = harness(vec![], RecordingRunner::new());
        let err = h
            .orchestrator
            .handle(RemediateRequest {
                execute_choice: Some(3),
                session_id: Some("rem-x".to_string()),
                ..RemediateRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MedicError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_validation_pass_never_executes() {
        // Outer run executes; the validation pass reports the issue as
        // STILL ACTIVE with execute-worthy confidence/risk. If the depth
        // guard failed, the runner would see a second command.
        let h = harness(
            vec![
                text_turn(analysis_message("active", 0.95, "low", true)),
                text_turn(analysis_message("active", 0.95, "low", true)),
            ],
            RecordingRunner::new(),
        );
        let response = h
            .orchestrator
            .handle(issue_request("stubborn issue", ExecutionMode::Automatic))
            .await
            .unwrap();

        assert_eq!(response["status"], "executed_successfully");
        assert_eq!(response["validation"]["analysis"]["issueStatus"], "active");
        // Exactly one execution happened across both levels
        assert_eq!(h.runner_log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_parked_session() {
        let h = harness(
            vec![text_turn(analysis_message("active", 0.9, "low", false))],
            RecordingRunner::new(),
        );
        let first = h
            .orchestrator
            .handle(issue_request("cancel me", ExecutionMode::Manual))
            .await
            .unwrap();
        let session_id = first["sessionId"].as_str().unwrap();

        let cancelled = h.orchestrator.cancel(session_id).await.unwrap();
        assert_eq!(cancelled["status"], "cancelled");
        let session = h.store.read(session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);

        // A cancelled session cannot be approved afterwards
        let err = h
            .orchestrator
            .handle(RemediateRequest {
                execute_choice: Some(1),
                session_id: Some(session_id.to_string()),
                ..RemediateRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MedicError::Validation { .. }));
    }
}
