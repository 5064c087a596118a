//! Supervisor configuration.
//!
//! Values come from explicit construction or from `LLAMACTL_*` environment
//! variables. Hosts are expected to load any `.env` file before calling
//! [`SupervisorConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default bind/connect host for supervised servers.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default first port tried by allocation.
pub const DEFAULT_BASE_PORT: u16 = 8080;

/// Default wait between SIGTERM and SIGKILL in `cleanup_process`.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default timeout for requests to a running server.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_SERVER_PATH: &str = "LLAMACTL_SERVER_PATH";
const ENV_HOST: &str = "LLAMACTL_HOST";
const ENV_BASE_PORT: &str = "LLAMACTL_BASE_PORT";
const ENV_SHUTDOWN_GRACE: &str = "LLAMACTL_SHUTDOWN_GRACE_SECS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Could not determine a data directory for the default server path")]
    NoDataDir,
}

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Path to the llama-server binary.
    pub server_path: PathBuf,
    /// Host servers bind to and clients connect to.
    pub host: String,
    /// First port tried by allocation.
    pub base_port: u16,
    /// Wait between graceful and forced termination.
    pub shutdown_grace: Duration,
    /// Timeout for client requests.
    pub request_timeout: Duration,
}

impl SupervisorConfig {
    /// Create a configuration with defaults for everything but the binary.
    pub fn new(server_path: impl Into<PathBuf>) -> Self {
        Self {
            server_path: server_path.into(),
            host: DEFAULT_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build a configuration from `LLAMACTL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_path = match lookup(ENV_SERVER_PATH).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_server_path()?,
        };

        let mut config = Self::new(server_path);

        if let Some(host) = lookup(ENV_HOST).filter(|v| !v.trim().is_empty()) {
            config.host = host;
        }

        if let Some(raw) = lookup(ENV_BASE_PORT) {
            let port: u16 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    var: ENV_BASE_PORT,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            if port < 1024 {
                return Err(ConfigError::InvalidValue {
                    var: ENV_BASE_PORT,
                    value: raw,
                    reason: "privileged port, use >= 1024".to_string(),
                });
            }
            config.base_port = port;
        }

        if let Some(raw) = lookup(ENV_SHUTDOWN_GRACE) {
            let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    var: ENV_SHUTDOWN_GRACE,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            config.shutdown_grace = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the base port.
    #[must_use]
    pub const fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the client request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Default location of the managed llama-server binary.
///
/// `<data_local_dir>/llamactl/bin/llama-server`
pub fn default_server_path() -> Result<PathBuf, ConfigError> {
    let data_dir = dirs::data_local_dir().ok_or(ConfigError::NoDataDir)?;

    #[cfg(target_os = "windows")]
    let binary_name = "llama-server.exe";

    #[cfg(not(target_os = "windows"))]
    let binary_name = "llama-server";

    Ok(data_dir.join("llamactl").join("bin").join(binary_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = SupervisorConfig::new("/opt/llama-server");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.base_port, DEFAULT_BASE_PORT);
        assert_eq!(config.shutdown_grace, DEFAULT_SHUTDOWN_GRACE);
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = SupervisorConfig::from_lookup(lookup_from(&[
            (ENV_SERVER_PATH, "/opt/bin/llama-server"),
            (ENV_HOST, "localhost"),
            (ENV_BASE_PORT, "9100"),
            (ENV_SHUTDOWN_GRACE, "2"),
        ]))
        .unwrap();

        assert_eq!(config.server_path, PathBuf::from("/opt/bin/llama-server"));
        assert_eq!(config.host, "localhost");
        assert_eq!(config.base_port, 9100);
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let err = SupervisorConfig::from_lookup(lookup_from(&[
            (ENV_SERVER_PATH, "/opt/bin/llama-server"),
            (ENV_BASE_PORT, "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == ENV_BASE_PORT));

        let err = SupervisorConfig::from_lookup(lookup_from(&[
            (ENV_SERVER_PATH, "/opt/bin/llama-server"),
            (ENV_BASE_PORT, "80"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("privileged"));
    }

    #[test]
    fn test_default_server_path_shape() {
        if let Ok(path) = default_server_path() {
            assert!(path.ends_with("llamactl/bin/llama-server") || path.ends_with("llama-server.exe"));
        }
    }
}
