//! Error types for the harness

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the harness Error
pub type Result<T> = std::result::Result<T, Error>;

/// Harness error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Timed out after {after:?} waiting for: {what}")]
    Timeout { what: String, after: Duration },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("API request failed with status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Invalid drop target: {0}")]
    InvalidDropTarget(String),

    #[error("{sessions} client(s) failed to converge after {waited:?}")]
    Convergence { sessions: usize, waited: Duration },

    #[error("{severity}: {} card(s) missing after operation: {}", .missing.len(), .missing.join(", "))]
    DataLoss {
        missing: Vec<String>,
        severity: Severity,
    },

    #[error("Unknown column: {0}")]
    Column(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid route pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// How bad a failure is. Most failures block the test; a `DeploymentBlocker`
/// additionally marks the build as unshippable (cards vanished).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Failure,
    DeploymentBlocker,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Failure => write!(f, "test failure"),
            Severity::DeploymentBlocker => write!(f, "DEPLOYMENT BLOCKER"),
        }
    }
}

impl Error {
    /// True when the error indicates user data disappeared.
    pub fn is_data_loss(&self) -> bool {
        matches!(self, Error::DataLoss { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_loss_formats_as_blocker() {
        let err = Error::DataLoss {
            missing: vec!["Fix login".to_string(), "Ship v2".to_string()],
            severity: Severity::DeploymentBlocker,
        };
        let msg = err.to_string();
        assert!(msg.contains("DEPLOYMENT BLOCKER"), "got: {}", msg);
        assert!(msg.contains("2 card(s)"), "got: {}", msg);
        assert!(msg.contains("Fix login"), "got: {}", msg);
        assert!(err.is_data_loss());
    }

    #[test]
    fn timeout_names_the_condition() {
        let err = Error::Timeout {
            what: "card visible in Done".to_string(),
            after: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("card visible in Done"));
    }
}
