//! Test doubles for the sidecar and client seams.
//!
//! Provides:
//! - [`StubLauncher`]: a [`Launcher`] that hands out fake processes and counts spawns
//! - [`RecordingSignaler`]: a [`Signaler`] that records every signal it is asked to send
//! - [`RecordingFetch`]: a [`Fetch`] that records requests and answers with an error
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tier_client::sidecar::{SidecarConfig, SidecarManager};
//! use tier_client::testing::{RecordingSignaler, StubBehavior, StubLauncher};
//!
//! let manager = SidecarManager::with_parts(
//!     SidecarConfig::default(),
//!     Arc::new(StubLauncher::new(StubBehavior::Running)),
//!     Arc::new(RecordingSignaler::new()),
//! );
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::Fetch;
use crate::error::ClientError;
use crate::sidecar::{
    Launcher, SidecarConfig, SidecarEndpoint, SidecarError, SidecarProcess, Signal, Signaler,
};

/// Serializes tests that read or mutate the process environment.
#[cfg(test)]
pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// How processes from a [`StubLauncher`] behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StubBehavior {
    /// Spawn succeeds and the process keeps running.
    Running,
    /// Spawn succeeds but the process has already exited.
    ExitImmediately,
    /// Spawn itself fails.
    SpawnError,
}

/// A [`Launcher`] that never starts a real process.
pub struct StubLauncher {
    behavior: StubBehavior,
    delay: Duration,
    spawns: AtomicU32,
    kills: Arc<AtomicU32>,
}

impl StubLauncher {
    /// Pid handed to the first spawned process. Later spawns count up from it.
    pub const FIRST_PID: u32 = 4242;

    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            spawns: AtomicU32::new(0),
            kills: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make every launch take `delay` before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of launch attempts so far.
    pub fn spawn_count(&self) -> u32 {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Number of processes killed by the manager.
    pub fn killed_count(&self) -> u32 {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for StubLauncher {
    async fn launch(
        &self,
        config: &SidecarConfig,
        _endpoint: &SidecarEndpoint,
    ) -> Result<Box<dyn SidecarProcess>, SidecarError> {
        let n = self.spawns.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            StubBehavior::SpawnError => Err(SidecarError::SpawnFailed {
                program: config.program_name(),
                reason: "No such file or directory (os error 2)".to_string(),
            }),
            behavior => Ok(Box::new(StubProcess {
                pid: Self::FIRST_PID + n,
                exited: behavior == StubBehavior::ExitImmediately,
                killed: false,
                kills: Arc::clone(&self.kills),
            })),
        }
    }
}

struct StubProcess {
    pid: u32,
    exited: bool,
    killed: bool,
    kills: Arc<AtomicU32>,
}

#[async_trait]
impl SidecarProcess for StubProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_exited(&mut self) -> Option<String> {
        self.exited.then(|| "exit status: 1".to_string())
    }

    async fn kill(&mut self) {
        if !self.killed {
            self.killed = true;
            self.kills.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A [`Signaler`] that records `(pid, signal)` pairs instead of sending them.
pub struct RecordingSignaler {
    supported: bool,
    fail: bool,
    calls: Mutex<Vec<(u32, Signal)>>,
}

impl RecordingSignaler {
    pub fn new() -> Self {
        Self {
            supported: true,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A signaler for a host without signal delivery.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// A signaler whose sends fail as if the process were already gone.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Every signal requested so far.
    pub fn calls(&self) -> Vec<(u32, Signal)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for RecordingSignaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Signaler for RecordingSignaler {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((pid, signal));
        }
        if self.fail {
            Err(std::io::Error::from_raw_os_error(3)) // ESRCH
        } else {
            Ok(())
        }
    }
}

/// A [`Fetch`] that records each request and fails it with a fixed status.
#[derive(Default)]
pub struct RecordingFetch {
    requests: Mutex<Vec<RecordedRequest>>,
}

/// What a [`RecordingFetch`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
}

impl RecordingFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetch for RecordingFetch {
    async fn fetch(&self, request: reqwest::Request) -> Result<reqwest::Response, ClientError> {
        let recorded = RecordedRequest {
            method: request.method().to_string(),
            url: request.url().to_string(),
            authorization: request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(recorded);
        }

        Err(ClientError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "recorded".to_string(),
        })
    }
}
