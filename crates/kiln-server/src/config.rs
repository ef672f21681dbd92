//! Configuration for the HTTP server.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use kiln_core::{DriverRegistry, ExecError, ExecutorConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum accepted request body in bytes (10 MB).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Origins allowed by default (a local frontend dev server).
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Configuration for the Kiln HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address.
    pub http_addr: SocketAddr,

    /// Directory for per-request workspaces.
    pub scratch_root: PathBuf,

    /// Budget for each compile and run step.
    pub step_timeout: Duration,

    /// Cap on captured stdout/stderr per stream.
    pub max_output_bytes: usize,

    /// CORS origins. A single `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8000),
            scratch_root: executor.scratch_root,
            step_timeout: executor.step_timeout,
            max_output_bytes: executor.max_output_bytes,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `KILN_HTTP_HOST` | `0.0.0.0` |
    /// | `KILN_HTTP_PORT` | `8000` |
    /// | `KILN_SCRATCH_ROOT` | `<tmp>/kiln` |
    /// | `KILN_TIMEOUT_SECS` | `10` |
    /// | `KILN_MAX_OUTPUT_BYTES` | `1048576` |
    /// | `KILN_ALLOWED_ORIGINS` | `http://localhost:3000,http://127.0.0.1:3000` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        let http_host: IpAddr = lookup("KILN_HTTP_HOST")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.ip());

        let http_port: u16 = lookup("KILN_HTTP_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.http_addr.port());

        Self {
            http_addr: SocketAddr::new(http_host, http_port),
            scratch_root: lookup("KILN_SCRATCH_ROOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.scratch_root),
            step_timeout: lookup("KILN_TIMEOUT_SECS")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(default.step_timeout),
            max_output_bytes: lookup("KILN_MAX_OUTPUT_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_output_bytes),
            allowed_origins: lookup("KILN_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Build the executor configuration, validating it.
    pub fn executor_config(&self) -> Result<ExecutorConfig, ExecError> {
        ExecutorConfig::builder()
            .scratch_root(&self.scratch_root)
            .step_timeout(self.step_timeout)
            .max_output_bytes(self.max_output_bytes)
            .build()
    }

    /// Log toolchains that drivers need but the host lacks.
    ///
    /// Requests for those languages still resolve; they fail at spawn time.
    pub fn validate_warn(&self, registry: &DriverRegistry) {
        for (language, program) in registry.missing_toolchains() {
            tracing::warn!(%language, program, "Toolchain not found on PATH");
        }
        if self.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured; browsers will be refused");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr.port(), 8000);
        assert_eq!(config.step_timeout, Duration::from_secs(10));
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "http://127.0.0.1:3000"]
        );
    }

    #[test]
    fn test_from_lookup_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        let default = ServerConfig::default();
        assert_eq!(config.http_addr, default.http_addr);
        assert_eq!(config.scratch_root, default.scratch_root);
        assert_eq!(config.step_timeout, default.step_timeout);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("KILN_HTTP_HOST", "127.0.0.1"),
            ("KILN_HTTP_PORT", "9090"),
            ("KILN_SCRATCH_ROOT", "/var/tmp/kiln"),
            ("KILN_TIMEOUT_SECS", "2.5"),
            ("KILN_MAX_OUTPUT_BYTES", "2048"),
            ("KILN_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ]));
        assert_eq!(config.http_addr, "127.0.0.1:9090".parse().unwrap());
        assert_eq!(config.scratch_root, PathBuf::from("/var/tmp/kiln"));
        assert_eq!(config.step_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_output_bytes, 2048);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("KILN_HTTP_PORT", "not-a-port"),
            ("KILN_TIMEOUT_SECS", "-1"),
        ]));
        assert_eq!(config.http_addr.port(), 8000);
        assert_eq!(config.step_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_executor_config_rejects_zero_output() {
        let config = ServerConfig {
            max_output_bytes: 0,
            ..Default::default()
        };
        assert!(config.executor_config().is_err());
    }
}
