//! Error types for kiln-core.

use crate::language::Language;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for kiln-core operations.
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors that can occur while handling an execution request.
///
/// Only [`ExecError::EmptyInput`] and [`ExecError::UnsupportedLanguage`] ever
/// leave [`Executor::execute`](crate::Executor::execute); every other variant
/// is folded into an [`ExecutionResult`](crate::ExecutionResult).
#[derive(Debug, Error)]
pub enum ExecError {
    /// Submitted code is empty or whitespace only.
    #[error("Code cannot be empty")]
    EmptyInput,

    /// Language name is not part of the supported set.
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Language is supported but has no execution driver.
    #[error("Execution not supported for {0} yet")]
    ExecutionNotSupported(Language),

    /// A driver's source transform could not find its entry point.
    #[error("{language} source must declare {expected}")]
    MissingEntryPoint {
        /// Language whose transform failed
        language: Language,
        /// Human readable description of the expected declaration
        expected: &'static str,
    },

    /// A compile or run step exceeded its budget.
    #[error("Execution timed out.")]
    Timeout {
        /// Budget that was exceeded
        budget: Duration,
    },

    /// A child process could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The embedded query engine rejected the batch.
    #[error("{0}")]
    Query(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unexpected failure inside the orchestrator.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error while staging or cleaning up.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Whether this error rejects the request outright instead of being
    /// reported inside an execution result.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::UnsupportedLanguage(_))
    }
}

impl From<rusqlite::Error> for ExecError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ExecError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kinds() {
        assert!(ExecError::EmptyInput.is_rejection());
        assert!(ExecError::UnsupportedLanguage("cobol".into()).is_rejection());
        assert!(!ExecError::ExecutionNotSupported(Language::Go).is_rejection());
        assert!(!ExecError::Timeout {
            budget: Duration::from_secs(1)
        }
        .is_rejection());
    }

    #[test]
    fn test_timeout_message() {
        let err = ExecError::Timeout {
            budget: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "Execution timed out.");
    }

    #[test]
    fn test_not_supported_message() {
        let err = ExecError::ExecutionNotSupported(Language::Rust);
        assert_eq!(err.to_string(), "Execution not supported for rust yet");
    }
}
