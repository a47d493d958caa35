//! Configuration types for the local Tier sidecar.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a locally spawned `tier serve` process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    /// Executable to run (looked up on `PATH` when not absolute).
    pub program: PathBuf,
    /// Address the sidecar binds to.
    pub host: String,
    /// Port to bind. `0` picks a free port at start.
    pub port: u16,
    /// Run the sidecar against live mode (`--live`).
    pub live: bool,
    /// Extra environment variables: (name, value).
    pub env: Vec<(String, String)>,
    /// Readiness probe.
    pub health_check: HealthCheck,
    /// Time to wait for the readiness probe to pass.
    pub startup_timeout: Duration,
    /// Interval between readiness polls.
    pub health_poll_interval: Duration,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tier"),
            host: "127.0.0.1".to_string(),
            port: 0,
            live: false,
            env: Vec::new(),
            health_check: HealthCheck::Tcp,
            startup_timeout: Duration::from_secs(30),
            health_poll_interval: Duration::from_millis(100),
        }
    }
}

impl SidecarConfig {
    /// Command line arguments for a sidecar listening on `endpoint`.
    pub fn args(&self, endpoint: &SidecarEndpoint) -> Vec<String> {
        let mut args = Vec::with_capacity(4);
        if self.live {
            args.push("--live".to_string());
        }
        args.push("serve".to_string());
        args.push("--addr".to_string());
        args.push(endpoint.to_string());
        args
    }

    /// Program name for error messages and logs.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Readiness probe for the sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HealthCheck {
    /// No probe (ready as soon as the process is spawned).
    None,
    /// Ready once the port accepts TCP connections.
    #[default]
    Tcp,
    /// Ready once `GET <path>` returns a success status.
    Http {
        /// Path to check (e.g., "/v1/whoami").
        path: String,
    },
}

/// Address a sidecar listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarEndpoint {
    /// Host address (usually 127.0.0.1).
    pub host: String,
    pub port: u16,
}

impl SidecarEndpoint {
    /// Get the HTTP URL for this endpoint.
    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for SidecarEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let config = SidecarConfig::default();
        let endpoint = SidecarEndpoint {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };

        assert_eq!(config.args(&endpoint), ["serve", "--addr", "127.0.0.1:8080"]);
    }

    #[test]
    fn test_live_args() {
        let config = SidecarConfig {
            live: true,
            ..Default::default()
        };
        let endpoint = SidecarEndpoint {
            host: "localhost".to_string(),
            port: 1,
        };

        assert_eq!(
            config.args(&endpoint),
            ["--live", "serve", "--addr", "localhost:1"]
        );
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = SidecarEndpoint {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };

        assert_eq!(endpoint.http_url(), "http://127.0.0.1:8080");
        assert_eq!(endpoint.to_string(), "127.0.0.1:8080");
    }
}
