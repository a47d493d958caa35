//! Sidecar lifecycle management for a local `tier serve` process.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::sidecar::config::{HealthCheck, SidecarConfig, SidecarEndpoint};
use crate::sidecar::error::{Result, SidecarError};
use crate::sidecar::exit;
use crate::sidecar::process::{
    CommandLauncher, Launcher, LibcSignaler, Signal, SidecarProcess, Signaler,
};

static GLOBAL: OnceLock<SidecarManager> = OnceLock::new();

/// State of the sidecar process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarState {
    /// Not started yet.
    NotStarted,
    /// Currently starting up.
    Starting,
    /// Running and ready. Terminal for the manager's lifetime.
    Ready,
    /// Last start attempt failed. The next `ensure_ready` tries again.
    Failed,
}

type Attempt = Shared<BoxFuture<'static, Result<SidecarEndpoint>>>;

enum Slot {
    NotStarted,
    Starting(Attempt),
    Ready(SidecarEndpoint),
    Failed,
}

/// Manages a single local sidecar process.
///
/// Starts the process on first request, shares one in-flight start between
/// concurrent callers, and signals the process on host exit through
/// [`SidecarManager::handle_exit`].
#[derive(Clone)]
pub struct SidecarManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SidecarConfig,
    launcher: Arc<dyn Launcher>,
    signaler: Arc<dyn Signaler>,
    slot: Mutex<Slot>,
    /// Pid of the spawned sidecar; the only state the exit handler touches.
    pid: Mutex<Option<u32>>,
    /// Reusable HTTP client for health checks.
    http_client: reqwest::Client,
}

impl SidecarManager {
    /// Create a manager that spawns with `tokio::process` and signals with `kill(2)`.
    pub fn new(config: SidecarConfig) -> Self {
        Self::with_parts(config, Arc::new(CommandLauncher), Arc::new(LibcSignaler))
    }

    /// Create a manager with explicit process primitives.
    pub fn with_parts(
        config: SidecarConfig,
        launcher: Arc<dyn Launcher>,
        signaler: Arc<dyn Signaler>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            inner: Arc::new(Inner {
                config,
                launcher,
                signaler,
                slot: Mutex::new(Slot::NotStarted),
                pid: Mutex::new(None),
                http_client,
            }),
        }
    }

    /// The process-wide manager.
    ///
    /// Created from `config` on first use, which also installs the exit and
    /// signal hooks. Later calls return the same manager; their `config` is
    /// ignored.
    pub fn global(config: &SidecarConfig) -> &'static SidecarManager {
        let manager = GLOBAL.get_or_init(|| SidecarManager::new(config.clone()));
        if manager.config() != config {
            tracing::debug!(
                "Sidecar manager already initialized, ignoring new config for '{}'",
                config.program_name()
            );
        }
        exit::install_exit_hooks();
        manager
    }

    /// Get the current state.
    pub fn state(&self) -> SidecarState {
        match &*self.inner.lock_slot() {
            Slot::NotStarted => SidecarState::NotStarted,
            Slot::Starting(_) => SidecarState::Starting,
            Slot::Ready(_) => SidecarState::Ready,
            Slot::Failed => SidecarState::Failed,
        }
    }

    /// Get the endpoint once the sidecar is ready.
    pub fn endpoint(&self) -> Option<SidecarEndpoint> {
        match &*self.inner.lock_slot() {
            Slot::Ready(endpoint) => Some(endpoint.clone()),
            _ => None,
        }
    }

    /// Pid of the tracked sidecar process, if any.
    pub fn tracked_pid(&self) -> Option<u32> {
        *self.inner.lock_pid()
    }

    /// Get the configuration.
    pub fn config(&self) -> &SidecarConfig {
        &self.inner.config
    }

    /// Ensure the sidecar is running and ready.
    ///
    /// Returns the cached endpoint once ready. While a start is in flight,
    /// callers wait on that attempt instead of spawning a second process.
    /// After a failure the next call starts a fresh attempt.
    pub async fn ensure_ready(&self) -> Result<SidecarEndpoint> {
        let attempt = {
            let mut slot = self.inner.lock_slot();
            match &*slot {
                Slot::Ready(endpoint) => return Ok(endpoint.clone()),
                Slot::Starting(attempt) => attempt.clone(),
                Slot::NotStarted | Slot::Failed => {
                    let inner = Arc::clone(&self.inner);
                    let attempt = inner.start().boxed().shared();
                    *slot = Slot::Starting(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Exit hook: signal the tracked sidecar, if any.
    ///
    /// Sends `signal`, or `SIGTERM` for a normal exit. The pid is cleared so
    /// the process is signaled at most once. Failures are logged, never
    /// propagated.
    pub fn handle_exit(&self, signal: Option<Signal>) {
        let Some(pid) = self.inner.lock_pid().take() else {
            return;
        };

        let signal = signal.unwrap_or(Signal::Term);
        match self.inner.signaler.signal(pid, signal) {
            Ok(()) => tracing::debug!("Sent {} to Tier sidecar (pid {})", signal, pid),
            Err(e) => tracing::warn!("Failed to send {} to Tier sidecar (pid {}): {}", signal, pid, e),
        }
    }
}

/// The process-wide manager, if one was created.
pub(crate) fn global_manager() -> Option<&'static SidecarManager> {
    GLOBAL.get()
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pid(&self) -> MutexGuard<'_, Option<u32>> {
        self.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one start attempt and publish its outcome.
    async fn start(self: Arc<Self>) -> Result<SidecarEndpoint> {
        let result = self.do_start().await;

        match &result {
            Ok(endpoint) => {
                *self.lock_slot() = Slot::Ready(endpoint.clone());
            }
            Err(e) => {
                *self.lock_pid() = None;
                *self.lock_slot() = Slot::Failed;
                tracing::warn!("Tier sidecar failed to start: {}", e);
            }
        }

        result
    }

    async fn do_start(&self) -> Result<SidecarEndpoint> {
        if !self.signaler.is_supported() {
            return Err(SidecarError::Unsupported {
                reason: "this host cannot deliver signals to child processes".to_string(),
            });
        }

        let endpoint = self.reserve_endpoint()?;
        let program = self.config.program_name();

        tracing::info!("Starting Tier sidecar: {} on {}", program, endpoint);

        let mut process = self.launcher.launch(&self.config, &endpoint).await?;

        let Some(pid) = process.id() else {
            process.kill().await;
            return Err(SidecarError::SpawnFailed {
                program,
                reason: "process has no pid".to_string(),
            });
        };
        // Tracked from spawn on, so a host signal during startup still reaches it.
        *self.lock_pid() = Some(pid);

        let timeout = self.config.startup_timeout;
        let ready =
            tokio::time::timeout(timeout, self.wait_for_ready(process.as_mut(), &endpoint)).await;

        match ready {
            Ok(Ok(())) => {
                tracing::info!("Tier sidecar ready at {} (pid {})", endpoint.http_url(), pid);
                Ok(endpoint)
            }
            Ok(Err(e)) => {
                process.kill().await;
                Err(e)
            }
            Err(_) => {
                process.kill().await;
                Err(SidecarError::Timeout { program, timeout })
            }
        }
    }

    /// Pick the address to bind, reserving a free port when none is configured.
    fn reserve_endpoint(&self) -> Result<SidecarEndpoint> {
        let host = self.config.host.clone();
        if host.is_empty() {
            return Err(SidecarError::Config {
                reason: "host must not be empty".to_string(),
            });
        }

        let port = if self.config.port != 0 {
            self.config.port
        } else {
            let listener = std::net::TcpListener::bind((host.as_str(), 0)).map_err(|e| {
                SidecarError::SpawnFailed {
                    program: self.config.program_name(),
                    reason: format!("failed to find a free port on {host}: {e}"),
                }
            })?;
            listener
                .local_addr()
                .map_err(|e| SidecarError::SpawnFailed {
                    program: self.config.program_name(),
                    reason: format!("failed to read reserved port: {e}"),
                })?
                .port()
        };

        Ok(SidecarEndpoint { host, port })
    }

    /// Poll until the health check passes or the process exits.
    async fn wait_for_ready(
        &self,
        process: &mut dyn SidecarProcess,
        endpoint: &SidecarEndpoint,
    ) -> Result<()> {
        loop {
            if let Some(status) = process.try_exited() {
                return Err(SidecarError::Exited {
                    program: self.config.program_name(),
                    status,
                });
            }

            match self.check_health(endpoint).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => tracing::trace!("Health check error: {}", e),
            }

            tokio::time::sleep(self.config.health_poll_interval).await;
        }
    }

    async fn check_health(&self, endpoint: &SidecarEndpoint) -> std::result::Result<bool, String> {
        match &self.config.health_check {
            HealthCheck::None => Ok(true),
            HealthCheck::Tcp => Ok(self.tcp_health_check(endpoint).await),
            HealthCheck::Http { path } => {
                let url = format!("{}/{}", endpoint.http_url(), path.trim_start_matches('/'));
                self.http_health_check(&url).await
            }
        }
    }

    async fn http_health_check(&self, url: &str) -> std::result::Result<bool, String> {
        match self.http_client.get(url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            // Connection refused is expected during startup
            Err(e) if e.is_connect() => Ok(false),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn tcp_health_check(&self, endpoint: &SidecarEndpoint) -> bool {
        use tokio::net::TcpStream;

        let addr = (endpoint.host.as_str(), endpoint.port);
        matches!(
            tokio::time::timeout(Duration::from_secs(2), TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}
