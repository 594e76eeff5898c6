//! Engine configuration.
//!
//! Loaded from `medic-config.json` when present, otherwise assembled from
//! defaults and environment variables. Every field has a default so an
//! empty `{}` config is valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analysis::RiskLevel;
use crate::decision::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_RISK};
use crate::errors::{MedicError, MedicResult};

/// Environment variable overriding the session directory.
const ENV_SESSION_DIR: &str = "MEDIC_SESSION_DIR";

/// Environment variable overriding the model.
const ENV_MODEL: &str = "MEDIC_MODEL";

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicConfig {
    /// Model used for investigation
    #[serde(default = "default_model")]
    pub model: String,

    /// Directory holding session records
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    /// Ceiling on investigation iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Default confidence gate for unattended execution
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Default risk ceiling for unattended execution
    #[serde(default = "default_max_risk")]
    pub max_risk: RiskLevel,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".medic/sessions")
}

fn default_max_iterations() -> u32 {
    20
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_max_risk() -> RiskLevel {
    DEFAULT_MAX_RISK
}

impl Default for MedicConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            session_dir: default_session_dir(),
            max_iterations: default_max_iterations(),
            confidence_threshold: default_confidence_threshold(),
            max_risk: default_max_risk(),
        }
    }
}

impl MedicConfig {
    /// Load from a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> MedicResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MedicError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| MedicError::Config {
            reason: format!("invalid config {}: {e}", path.display()),
        })
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(ENV_SESSION_DIR) {
            config.session_dir = PathBuf::from(dir);
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            config.model = model;
        }
        config
    }
}
