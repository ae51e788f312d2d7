use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while locating, parsing, or validating `decoy.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read decoy config {path}: {source}")]
    Read { source: io::Error, path: PathBuf },
    #[error("decoy config {path} is not valid TOML: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("invalid [{section}] settings: {reason}")]
    Validation {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn validation(section: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            section,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
