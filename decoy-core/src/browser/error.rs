use std::time::Duration;

use thiserror::Error;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("browser session creation failed: {0}")]
    SessionCreation(String),
    #[error("element not found for selector '{0}'")]
    ElementNotFound(String),
    #[error("operation '{operation}' timed out after {budget:?}")]
    Timeout { operation: String, budget: Duration },
    #[error("operation '{operation}' failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        operation: String,
        attempts: usize,
        #[source]
        source: Box<AutomationError>,
    },
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AutomationError {
    /// Timeout classification drives session teardown in the execution guard.
    /// Driver-side deadline failures only surface as message text, so those
    /// are matched by signature.
    pub fn is_timeout(&self) -> bool {
        match self {
            AutomationError::Timeout { .. } => true,
            AutomationError::ExhaustedRetries { source, .. } => source.is_timeout(),
            AutomationError::Cdp(err) => {
                let message = err.to_string().to_ascii_lowercase();
                message.contains("timeout") || message.contains("timed out")
            }
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for AutomationError {
    fn from(err: tokio::task::JoinError) -> Self {
        AutomationError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_variant_classifies_as_timeout() {
        let err = AutomationError::Timeout {
            operation: "navigate".into(),
            budget: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
    }

    #[test]
    fn exhausted_retries_inherits_timeout_class() {
        let err = AutomationError::ExhaustedRetries {
            operation: "click".into(),
            attempts: 3,
            source: Box::new(AutomationError::Timeout {
                operation: "click".into(),
                budget: Duration::from_secs(1),
            }),
        };
        assert!(err.is_timeout());

        let err = AutomationError::ExhaustedRetries {
            operation: "click".into(),
            attempts: 3,
            source: Box::new(AutomationError::ElementNotFound("#missing".into())),
        };
        assert!(!err.is_timeout());
    }

    #[test]
    fn lookup_failures_are_not_timeouts() {
        assert!(!AutomationError::ElementNotFound("#x".into()).is_timeout());
        assert!(!AutomationError::SessionCreation("boom".into()).is_timeout());
    }
}
