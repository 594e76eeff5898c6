//! Typed analysis model.
//!
//! The AI's free-form diagnosis is validated into these types at the parser
//! boundary; everything downstream of the parser treats an [`Analysis`] as a
//! fully-typed, immutable value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MedicError;

/// What the investigation concluded about the reported symptom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// The issue is present and remediation is proposed
    Active,
    /// The issue existed but has already cleared
    Resolved,
    /// No evidence of the reported issue was found
    NonExistent,
}

/// Severity tag attached to each proposed action and to the plan as a whole.
///
/// Totally ordered: `Low < Medium < High`. The ordering is what the
/// execution policy gates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Ordinal position used in policy comparisons and skip messages.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RiskLevel {
    type Err = MedicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(MedicError::Validation {
                reason: format!("Invalid risk level '{other}' (expected low, medium, or high)"),
            }),
        }
    }
}

/// One proposed corrective step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationAction {
    /// What this step does, in operator-facing language
    pub description: String,
    /// The command to run, absent for advisory steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Risk of running this step
    pub risk: RiskLevel,
    /// Why this step addresses the root cause
    pub rationale: String,
}

/// The proposed fix as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationPlan {
    /// One-paragraph summary of the fix
    pub summary: String,
    /// Ordered corrective steps
    pub actions: Vec<RemediationAction>,
    /// Overall risk of the plan
    pub risk: RiskLevel,
}

impl RemediationPlan {
    /// The executable command strings, in action order.
    ///
    /// Advisory actions without a command are skipped; ordering among the
    /// remaining commands is preserved.
    pub fn commands(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| a.command.clone())
            .collect()
    }
}

/// The validated structured diagnosis extracted from the AI's final message.
///
/// Immutable once accepted; the parser is the only constructor on the
/// untrusted path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Whether the reported issue is active, resolved, or absent
    pub issue_status: IssueStatus,
    /// Diagnosed root cause
    pub root_cause: String,
    /// Self-reported confidence in `[0, 1]`
    pub confidence: f64,
    /// Contributing evidence gathered during investigation
    pub factors: Vec<String>,
    /// Proposed fix
    pub remediation: RemediationPlan,
    /// Text used to phrase the post-fix re-investigation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_intent: Option<String>,
}
