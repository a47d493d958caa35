//! Error types for sidecar management.

use std::time::Duration;

use thiserror::Error;

/// Result type for sidecar operations.
pub type Result<T> = std::result::Result<T, SidecarError>;

/// Errors that can occur while bringing up the sidecar.
///
/// `Clone` so that every caller waiting on one start attempt gets the same
/// outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SidecarError {
    /// The host cannot spawn or signal child processes.
    #[error("Sidecar unavailable: {reason}")]
    Unsupported {
        /// Why the host is unsupported.
        reason: String,
    },

    /// The process could not be started (missing executable, permissions).
    #[error("Sidecar unavailable: failed to spawn '{program}': {reason}")]
    SpawnFailed {
        /// Program that failed to start.
        program: String,
        /// Reason for failure.
        reason: String,
    },

    /// The process exited before it became ready.
    #[error("Sidecar unavailable: '{program}' exited before becoming ready ({status})")]
    Exited {
        /// Program that exited.
        program: String,
        /// Exit status as reported by the OS.
        status: String,
    },

    /// The process did not become ready in time and was terminated.
    #[error("Sidecar unavailable: '{program}' not ready within {timeout:?}")]
    Timeout {
        /// Program that timed out.
        program: String,
        /// Startup timeout.
        timeout: Duration,
    },

    /// Configuration error.
    #[error("Sidecar configuration error: {reason}")]
    Config {
        /// Reason for error.
        reason: String,
    },
}

impl SidecarError {
    /// Whether the helper failed to start at all. Safe to retry.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            Self::Unsupported { .. } | Self::SpawnFailed { .. } | Self::Exited { .. }
        )
    }

    /// Whether the helper started but never became ready.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
