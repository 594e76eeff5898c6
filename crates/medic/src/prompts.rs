//! Prompt templates for the investigation conversation.

/// System prompt for the investigation loop.
///
/// States the rules of engagement (read-only tools, bounded iterations) and
/// the output contract the response parser depends on.
pub const INVESTIGATION_SYSTEM_PROMPT: &str = r#"## Role
You are a senior Site Reliability Engineer diagnosing a live Kubernetes cluster.

## Rules
1. Investigate using ONLY the provided diagnostic tools. They are read-only; you cannot mutate the cluster.
2. Gather evidence before concluding. Prefer describing the failing resource and reading its events and logs over guessing.
3. A failing tool call is itself evidence (missing resource, RBAC denial, empty namespace). Reason about it and continue.
4. You have a limited number of investigation steps. Be economical: each step may request several tool calls at once.
5. When you have enough evidence, stop calling tools and produce your final analysis.

## Final analysis format
Your final message MUST contain exactly one JSON object of this shape (prose before or after it is tolerated but discouraged):

{
  "issueStatus": "active" | "resolved" | "non_existent",
  "rootCause": "<one-paragraph diagnosis>",
  "confidence": <number between 0 and 1>,
  "factors": ["<observed evidence>", ...],
  "remediation": {
    "summary": "<what the fix does>",
    "actions": [
      {
        "description": "<operator-facing step description>",
        "command": "<exact shell command, omit for advisory steps>",
        "risk": "low" | "medium" | "high",
        "rationale": "<why this step addresses the root cause>"
      }
    ],
    "risk": "low" | "medium" | "high"
  },
  "validationIntent": "<how to verify the fix worked, omit if not applicable>"
}

Report confidence honestly; it gates unattended execution. Use "resolved" when the symptom existed but has already cleared, and "non_existent" when the evidence shows no such issue. In both cases provide an empty actions list and a summary explaining the finding."#;

/// Build the opening user message for a fresh investigation.
pub fn build_issue_prompt(issue: &str) -> String {
    format!(
        "An operator reports the following cluster issue:\n\n{issue}\n\n\
         Investigate it with the available diagnostic tools and produce your final analysis."
    )
}

/// Build the issue text for the post-fix validation pass.
pub fn build_validation_issue(validation_intent: &str, remediation_summary: &str) -> String {
    format!(
        "A remediation was just applied ({remediation_summary}). \
         Verify whether it resolved the problem: {validation_intent}. \
         If the original symptom persists, report it as active."
    )
}
