//! Process primitives used by the sidecar manager.
//!
//! [`Launcher`] starts the helper, [`Signaler`] delivers termination signals
//! to a process id. Both are traits so the manager can be driven by stubs in
//! tests; the defaults use `tokio::process` and `kill(2)`.

use std::process::Stdio;

use async_trait::async_trait;

use crate::sidecar::config::{SidecarConfig, SidecarEndpoint};
use crate::sidecar::error::{Result, SidecarError};

/// Termination signals forwarded to the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Term,
    Int,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Int => "SIGINT",
        }
    }

    #[cfg(unix)]
    pub fn as_raw(&self) -> libc::c_int {
        match self {
            Signal::Term => libc::SIGTERM,
            Signal::Int => libc::SIGINT,
        }
    }

    #[cfg(unix)]
    pub fn from_raw(raw: libc::c_int) -> Option<Self> {
        match raw {
            libc::SIGTERM => Some(Signal::Term),
            libc::SIGINT => Some(Signal::Int),
            _ => None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivers signals to a process id.
pub trait Signaler: Send + Sync {
    /// Whether this host can deliver signals at all.
    fn is_supported(&self) -> bool {
        true
    }

    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<()>;
}

/// [`Signaler`] backed by `kill(2)`. Unsupported off unix.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcSignaler;

impl Signaler for LibcSignaler {
    fn is_supported(&self) -> bool {
        cfg!(unix)
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<()> {
        let pid = libc::pid_t::try_from(pid).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("pid {pid} out of range"),
            )
        })?;

        // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, signal.as_raw()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, _pid: u32, signal: Signal) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("cannot deliver {signal} on this platform"),
        ))
    }
}

/// A started sidecar process.
#[async_trait]
pub trait SidecarProcess: Send {
    /// OS process id, if the process is still known to the OS.
    fn id(&self) -> Option<u32>;

    /// Exit status, if the process has already exited.
    fn try_exited(&mut self) -> Option<String>;

    /// Forcefully stop the process. Best effort.
    async fn kill(&mut self);
}

/// Starts sidecar processes.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(
        &self,
        config: &SidecarConfig,
        endpoint: &SidecarEndpoint,
    ) -> Result<Box<dyn SidecarProcess>>;
}

/// [`Launcher`] that runs `config.program` with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch(
        &self,
        config: &SidecarConfig,
        endpoint: &SidecarEndpoint,
    ) -> Result<Box<dyn SidecarProcess>> {
        let args = config.args(endpoint);
        tracing::debug!("Spawning {} {}", config.program_name(), args.join(" "));

        let child = tokio::process::Command::new(&config.program)
            .args(&args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SidecarError::SpawnFailed {
                program: config.program_name(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: tokio::process::Child,
}

#[async_trait]
impl SidecarProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exited(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(format!("unknown status: {e}")),
        }
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("Failed to kill sidecar process: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names() {
        assert_eq!(Signal::Term.to_string(), "SIGTERM");
        assert_eq!(Signal::Int.as_str(), "SIGINT");
    }

    #[cfg(unix)]
    #[test]
    fn signal_raw_round_trip() {
        for signal in [Signal::Term, Signal::Int] {
            assert_eq!(Signal::from_raw(signal.as_raw()), Some(signal));
        }
        assert_eq!(Signal::from_raw(libc::SIGKILL), None);
        assert_eq!(Signal::from_raw(libc::SIGHUP), None);
    }

    #[cfg(unix)]
    #[test]
    fn libc_signaler_reports_missing_process() {
        // Largest valid pid; nothing runs there.
        let result = LibcSignaler.signal(libc::pid_t::MAX as u32, Signal::Term);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn command_launcher_missing_program_is_spawn_failure() {
        let config = SidecarConfig {
            program: "/nonexistent/tier-sidecar-test".into(),
            ..Default::default()
        };
        let endpoint = SidecarEndpoint {
            host: "127.0.0.1".to_string(),
            port: 1,
        };

        let err = match CommandLauncher.launch(&config, &endpoint).await {
            Ok(_) => panic!("spawning a missing program should fail"),
            Err(e) => e,
        };
        assert!(err.is_spawn_failure(), "unexpected error: {err}");
    }
}
