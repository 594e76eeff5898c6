//! Session persistence.
//!
//! One remediation attempt is one [`Session`], persisted as a single JSON
//! file named by its identifier. Writes are whole-record replacements with
//! temp-file-then-rename semantics, so a crash mid-write never leaves a
//! torn record. There is no cross-process locking: two writers racing on
//! the same session resolve last-rename-wins.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use runner::ExecutionResult;

use crate::analysis::Analysis;
use crate::decision::ExecutionMode;
use crate::errors::{MedicError, MedicResult};

/// Lifecycle state of a remediation session.
///
/// Transitions are monotonic: a session never returns to `Investigating`
/// once it has left that state. A fresh issue requires a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Investigating,
    AnalysisComplete,
    Failed,
    ExecutedSuccessfully,
    ExecutedWithErrors,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Investigating => "investigating",
            Self::AnalysisComplete => "analysis_complete",
            Self::Failed => "failed",
            Self::ExecutedSuccessfully => "executed_successfully",
            Self::ExecutedWithErrors => "executed_with_errors",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One remediation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque identifier, time-ordered with a random suffix
    pub session_id: String,
    /// Operator-supplied symptom description
    pub issue: String,
    /// Approval mode the session was opened with
    pub mode: ExecutionMode,
    /// Current lifecycle state
    pub status: SessionStatus,
    /// Validated diagnosis, set once when investigation completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_analysis: Option<Analysis>,
    /// Per-command outcomes, set only after execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<Vec<ExecutionResult>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Session {
    /// Open a fresh session in the `Investigating` state.
    pub fn new(issue: impl Into<String>, mode: ExecutionMode) -> Self {
        let now = Utc::now();
        Self {
            session_id: new_session_id(),
            issue: issue.into(),
            mode,
            status: SessionStatus::Investigating,
            final_analysis: None,
            execution_results: None,
            created: now,
            updated: now,
        }
    }
}

/// Generate a session identifier: creation-time prefix for sortability,
/// uuid-derived suffix for uniqueness.
pub fn new_session_id() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("rem-{stamp}-{}", &suffix[..8])
}

/// Partial change set applied by [`SessionStore::update`].
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub final_analysis: Option<Analysis>,
    pub execution_results: Option<Vec<ExecutionResult>>,
}

/// Durable, identifier-keyed persistence of session records.
///
/// Any backend satisfying the atomic-replace contract can stand in for the
/// file implementation (a database, a lock-guarded file, an in-memory map
/// for tests).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write a new record; fails if one already exists at that identifier.
    async fn create(&self, session: &Session) -> MedicResult<()>;

    /// Load the record or fail with a not-found error.
    async fn read(&self, session_id: &str) -> MedicResult<Session>;

    /// Load, merge the change set, stamp `updated`, write atomically.
    /// Returns the merged record.
    async fn update(&self, session_id: &str, changes: SessionUpdate) -> MedicResult<Session>;
}

/// File-backed session store: one `<sessionId>.json` per session.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> MedicResult<PathBuf> {
        // Identifiers are path components; anything else is a malformed
        // session reference, not a storage error.
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(MedicError::Validation {
                reason: format!("Malformed session id '{session_id}'"),
            });
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    async fn write_atomic(&self, path: &Path, session: &Session) -> MedicResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, &content)
            .await
            .map_err(|e| MedicError::FileWrite {
                path: tmp.display().to_string(),
                reason: e.to_string(),
            })?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| MedicError::FileWrite {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, session: &Session) -> MedicResult<()> {
        let path = self.session_path(&session.session_id)?;
        if path.exists() {
            return Err(MedicError::SessionExists {
                session_id: session.session_id.clone(),
            });
        }
        debug!(session_id = %session.session_id, "Creating session record");
        self.write_atomic(&path, session).await
    }

    async fn read(&self, session_id: &str) -> MedicResult<Session> {
        let path = self.session_path(session_id)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MedicError::SessionNotFound {
                    session_id: session_id.to_string(),
                });
            }
            Err(e) => {
                return Err(MedicError::FileRead {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content).map_err(|e| MedicError::FileRead {
            path: path.display().to_string(),
            reason: format!("corrupt session record: {e}"),
        })
    }

    async fn update(&self, session_id: &str, changes: SessionUpdate) -> MedicResult<Session> {
        let mut session = self.read(session_id).await?;

        if let Some(status) = changes.status {
            if status == SessionStatus::Investigating
                && session.status != SessionStatus::Investigating
            {
                return Err(MedicError::InvalidTransition {
                    session_id: session_id.to_string(),
                    from: session.status.to_string(),
                    to: status.to_string(),
                });
            }
            session.status = status;
        }
        if let Some(analysis) = changes.final_analysis {
            session.final_analysis = Some(analysis);
        }
        if let Some(results) = changes.execution_results {
            session.execution_results = Some(results);
        }
        session.updated = Utc::now();

        let path = self.session_path(session_id)?;
        self.write_atomic(&path, &session).await?;
        Ok(session)
    }
}
