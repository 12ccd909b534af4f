//! Error types for the scenario runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Target environment not configured: {0}")]
    Target(String),

    #[error(transparent)]
    Harness(#[from] boardwalk_harness::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

impl E2eError {
    /// True when the underlying failure is a data-loss escalation.
    pub fn is_deployment_blocker(&self) -> bool {
        match self {
            E2eError::Harness(e) => e.is_data_loss(),
            E2eError::StepFailed { reason, .. } => reason.contains("DEPLOYMENT BLOCKER"),
            _ => false,
        }
    }
}
