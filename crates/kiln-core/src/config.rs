//! Executor configuration types.

use crate::error::ExecError;
use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget for each compile and run step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum captured output per stream in bytes (1 MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Configuration for an [`Executor`](crate::Executor).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory under which per-request workspaces are created.
    pub scratch_root: PathBuf,
    /// Budget applied independently to each compile and run step.
    pub step_timeout: Duration,
    /// Captured stdout/stderr are truncated beyond this many bytes.
    pub max_output_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("kiln"),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExecutorConfig {
    /// Create a new config builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.scratch_root.as_os_str().is_empty() {
            return Err(ExecError::Config("scratch_root is required".into()));
        }
        if self.step_timeout.is_zero() {
            return Err(ExecError::Config("step_timeout must be > 0".into()));
        }
        if self.max_output_bytes == 0 {
            return Err(ExecError::Config("max_output_bytes must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for ExecutorConfig.
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Set the scratch root directory.
    pub fn scratch_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = path.into();
        self
    }

    /// Set the per-step timeout.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout = timeout;
        self
    }

    /// Set the maximum captured output per stream.
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ExecutorConfig, ExecError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.step_timeout, Duration::from_secs(10));
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert!(config.scratch_root.ends_with("kiln"));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = ExecutorConfig::builder()
            .step_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ExecError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_empty_root() {
        let result = ExecutorConfig::builder().scratch_root("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_success() {
        let config = ExecutorConfig::builder()
            .scratch_root("/tmp/kiln-test")
            .step_timeout(Duration::from_secs(3))
            .max_output_bytes(4096)
            .build()
            .expect("should build successfully");

        assert_eq!(config.scratch_root, PathBuf::from("/tmp/kiln-test"));
        assert_eq!(config.step_timeout, Duration::from_secs(3));
        assert_eq!(config.max_output_bytes, 4096);
    }
}
