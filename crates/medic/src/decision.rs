//! Execution policy.
//!
//! A single pure function maps (mode, confidence, risk) to an execution
//! verdict. No I/O, no side effects, no failure path: every input
//! combination yields a deterministic, explainable decision, which makes
//! this the unit-test surface for policy correctness.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::RiskLevel;
use crate::errors::MedicError;

/// Default confidence gate for unattended execution.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Default risk ceiling for unattended execution.
pub const DEFAULT_MAX_RISK: RiskLevel = RiskLevel::Low;

/// Whether proposed fixes need a human in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Every fix waits for explicit approval
    Manual,
    /// Fixes run unattended when confidence and risk clear the policy
    Automatic,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ExecutionMode {
    type Err = MedicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "automatic" => Ok(Self::Automatic),
            other => Err(MedicError::Validation {
                reason: format!("Invalid mode '{other}' (expected manual or automatic)"),
            }),
        }
    }
}

/// Verdict of the execution policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDecision {
    /// Run the proposed commands now
    pub should_execute: bool,
    /// Why the verdict came out this way
    pub reason: String,
    /// Caller-visible status when no execution happens on this call
    pub final_status: String,
    /// Human-readable explanation of a skipped automatic execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Decide whether a proposed fix may run without further approval.
///
/// Manual mode always waits for approval, regardless of confidence or
/// risk. Automatic mode executes iff confidence clears the threshold and
/// the plan risk does not exceed the ceiling. A skipped automatic
/// execution still reports `final_status: "success"`: the analysis itself
/// completed, and the skip is carried in `fallback_reason`.
pub fn decide(
    mode: ExecutionMode,
    confidence: f64,
    risk: RiskLevel,
    confidence_threshold: f64,
    max_risk: RiskLevel,
) -> ExecutionDecision {
    match mode {
        ExecutionMode::Manual => ExecutionDecision {
            should_execute: false,
            reason: "Manual mode requires explicit approval before executing remediation"
                .to_string(),
            final_status: "awaiting_user_approval".to_string(),
            fallback_reason: None,
        },
        ExecutionMode::Automatic => {
            if confidence < confidence_threshold {
                ExecutionDecision {
                    should_execute: false,
                    reason: "Confidence below automatic-execution threshold".to_string(),
                    final_status: "success".to_string(),
                    fallback_reason: Some(format!(
                        "Confidence {confidence:.2} is below the required threshold \
                         {confidence_threshold:.2}; automatic execution skipped"
                    )),
                }
            } else if risk.ordinal() > max_risk.ordinal() {
                ExecutionDecision {
                    should_execute: false,
                    reason: "Plan risk exceeds automatic-execution ceiling".to_string(),
                    final_status: "success".to_string(),
                    fallback_reason: Some(format!(
                        "Remediation risk '{risk}' exceeds the maximum allowed risk \
                         '{max_risk}'; automatic execution skipped"
                    )),
                }
            } else {
                ExecutionDecision {
                    should_execute: true,
                    reason: format!(
                        "Confidence {confidence:.2} meets threshold {confidence_threshold:.2} \
                         and risk '{risk}' is within '{max_risk}'"
                    ),
                    final_status: "success".to_string(),
                    fallback_reason: None,
                }
            }
        }
    }
}
