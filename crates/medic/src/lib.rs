#![warn(clippy::pedantic)]
// Allow common pedantic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::similar_names)]

//! # Medic
//!
//! An AI-assisted cluster remediation engine. An operator describes a
//! malfunctioning cluster symptom in natural language; the engine drives a
//! bounded, tool-calling AI investigation over read-only diagnostics,
//! validates the model's structured analysis, gates the proposed fix behind
//! a risk/confidence policy, executes approved commands with
//! partial-failure tolerance, and re-investigates once to confirm the fix.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use medic::{
//!     AnthropicProvider, FileSessionStore, KubectlExecutor, MedicConfig,
//!     RemediateRequest, RemediationOrchestrator,
//! };
//! use runner::LocalShell;
//!
//! let config = MedicConfig::from_env();
//! let orchestrator = RemediationOrchestrator::new(
//!     Arc::new(FileSessionStore::new(&config.session_dir)),
//!     Arc::new(AnthropicProvider::from_env()),
//!     Arc::new(KubectlExecutor::new()),
//!     Arc::new(LocalShell::new()),
//!     config,
//! );
//!
//! let response = orchestrator.handle(RemediateRequest {
//!     issue: Some("pod web-0 is CrashLooping in prod".into()),
//!     ..RemediateRequest::default()
//! }).await?;
//! ```

// Typed analysis model
pub mod analysis;

// Error types
pub mod errors;

// Engine configuration
pub mod config;

// Structured-analysis recovery and validation
pub mod parser;

// Session persistence
pub mod session;

// Execution policy
pub mod decision;

// AI integration
pub mod ai;

// Prompt templates
pub mod prompts;

// Diagnostic tool catalog and executors
pub mod diagnostics;

// Bounded investigation loop
pub mod investigation;

// Top-level state machine
pub mod orchestrator;

// Re-export key types for convenience
pub use ai::{AIProvider, AnthropicProvider};
pub use analysis::{Analysis, IssueStatus, RemediationAction, RemediationPlan, RiskLevel};
pub use config::MedicConfig;
pub use decision::{decide, ExecutionDecision, ExecutionMode};
pub use diagnostics::{diagnostic_tools, DiagnosticExecutor, KubectlExecutor};
pub use errors::{MedicError, MedicResult};
pub use investigation::{InvestigationDriver, InvestigationReport};
pub use orchestrator::{RemediateRequest, RemediationOrchestrator};
pub use parser::parse_analysis;
pub use session::{FileSessionStore, Session, SessionStatus, SessionStore, SessionUpdate};
