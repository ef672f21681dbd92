//! Request and response bodies for the HTTP API.

use kiln_core::{ExecutionRequest, ExecutionResult, Language};
use serde::{Deserialize, Serialize};

/// Body of `POST /run`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunRequest {
    /// Source code to execute.
    pub code: String,

    /// Language name (case-insensitive).
    pub language: String,
}

impl From<RunRequest> for ExecutionRequest {
    fn from(req: RunRequest) -> Self {
        ExecutionRequest::new(req.code, req.language)
    }
}

/// Result of `POST /run`. An empty `error` means success.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunResponse {
    /// Captured standard output.
    pub output: String,

    /// Captured standard error, or the reason execution failed.
    pub error: String,
}

impl From<ExecutionResult> for RunResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            output: result.stdout,
            error: result.stderr,
        }
    }
}

/// Result of `GET /languages`.
#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    /// Every language the service recognizes.
    pub supported: Vec<Language>,

    /// Languages that can actually be executed.
    pub executable: Vec<Language>,
}

/// Body returned with 4xx/5xx statuses.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}
