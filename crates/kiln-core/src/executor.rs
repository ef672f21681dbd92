//! Request orchestration: validate, resolve, stage, run, normalize, release.

use crate::config::ExecutorConfig;
use crate::driver::{Driver, EmbeddedEngine, ProcessDriver};
use crate::error::ExecError;
use crate::language::Language;
use crate::normalize::ExecutionResult;
use crate::registry::DriverRegistry;
use crate::runner::ProcessRunner;
use crate::workspace::Workspace;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// A request to execute `code` written in `language`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionRequest {
    /// Source text, passed to the driver as-is.
    pub code: String,
    /// Language name, matched case-insensitively (e.g. `"python"`, `"C#"`).
    pub language: String,
}

impl ExecutionRequest {
    /// Create a request.
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
        }
    }
}

/// Executes requests against a shared, read-only driver registry.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<DriverRegistry>,
    runner: ProcessRunner,
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor with the standard driver set.
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_registry(config, DriverRegistry::standard())
    }

    /// Create an executor with a custom registry.
    pub fn with_registry(config: ExecutorConfig, registry: DriverRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            runner: ProcessRunner::new(config.step_timeout, config.max_output_bytes),
            config,
        }
    }

    /// Get the driver registry.
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a request.
    ///
    /// # Errors
    ///
    /// Only [`ExecError::EmptyInput`] and [`ExecError::UnsupportedLanguage`]
    /// are returned, both before any filesystem or process work. Every
    /// other failure is reported through the result's `stderr`.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        if request.code.trim().is_empty() {
            return Err(ExecError::EmptyInput);
        }
        let language = Language::parse(&request.language)?;

        let driver = match self.registry.driver(language) {
            Ok(driver) => driver,
            Err(e) => {
                tracing::debug!(language = %language, "No execution driver");
                return Ok(ExecutionResult::from_error(&e));
            }
        };

        let start = Instant::now();
        let result = match driver {
            Driver::Process(driver) => self.run_process(&request.code, driver).await,
            Driver::Embedded(engine) => self.run_embedded(&request.code, engine.as_ref()).await,
        };

        let result = result.unwrap_or_else(|e| {
            tracing::warn!(language = %language, error = %e, "Execution failed");
            ExecutionResult::from_error(&e)
        });
        tracing::info!(
            language = %language,
            success = result.is_success(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Execution finished"
        );
        Ok(result)
    }

    async fn run_process(
        &self,
        code: &str,
        driver: &ProcessDriver,
    ) -> Result<ExecutionResult, ExecError> {
        let workspace = Workspace::stage(&self.config.scratch_root, code, driver).await?;
        let outcome = self.runner.compile_and_run(&workspace, driver).await;

        // Release on every path; the drop guard covers cancellation.
        if let Err(e) = workspace.release().await {
            tracing::warn!(error = %e, "Workspace release failed");
        }
        Ok(outcome?.into())
    }

    async fn run_embedded(
        &self,
        code: &str,
        engine: &dyn EmbeddedEngine,
    ) -> Result<ExecutionResult, ExecError> {
        let outcome = engine
            .execute(code, self.config.step_timeout, self.config.max_output_bytes)
            .await?;
        Ok(outcome.into())
    }
}
