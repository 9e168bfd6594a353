//! Error types for the policy engine

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    #[error("policy file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("policy file {} is corrupt: {message}", path.display())]
    CorruptData { path: PathBuf, message: String },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::CorruptData {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Checks that a rate lies in `[0, 1]`.
pub(crate) fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}
