//! Host exit hooks for the process-wide sidecar.
//!
//! Installed once, the first time [`SidecarManager::global`] is used:
//! - `atexit`: normal exit sends `SIGTERM` to the sidecar.
//! - `SIGINT`/`SIGTERM`: the same signal is forwarded to the sidecar.
//!   Signals the host ignores are not watched. The host itself is only
//!   terminated afterwards if the signal was at its default action.
//!
//! [`SidecarManager::global`]: crate::sidecar::SidecarManager::global

use std::sync::Once;

use crate::sidecar::manager::global_manager;
use crate::sidecar::process::Signal;

static INSTALL: Once = Once::new();

/// Install the exit hooks. Idempotent.
pub(crate) fn install_exit_hooks() {
    INSTALL.call_once(|| {
        #[cfg(unix)]
        {
            install_atexit();
            install_signal_listener();
        }
        #[cfg(not(unix))]
        tracing::debug!("Sidecar exit hooks are not supported on this platform");
    });
}

fn handle_global_exit(signal: Option<Signal>) {
    if let Some(manager) = global_manager() {
        manager.handle_exit(signal);
    }
}

#[cfg(unix)]
extern "C" fn on_process_exit() {
    handle_global_exit(None);
}

#[cfg(unix)]
fn install_atexit() {
    // SAFETY: registers a plain function with no captured state; it only
    // touches 'static data.
    let rc = unsafe { libc::atexit(on_process_exit) };
    if rc != 0 {
        tracing::warn!("Failed to register sidecar exit handler (atexit returned {})", rc);
    }
}

/// How the host treated a signal before the hooks were installed.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Default,
    Ignored,
    Handled,
}

#[cfg(unix)]
impl Disposition {
    fn current(raw: libc::c_int) -> Self {
        // SAFETY: a null new action only reads the current one into `old`.
        let (rc, old) = unsafe {
            let mut old: libc::sigaction = std::mem::zeroed();
            let rc = libc::sigaction(raw, std::ptr::null(), &mut old);
            (rc, old)
        };

        if rc != 0 {
            // Unknown; forward only and leave the host alone.
            return Disposition::Handled;
        }
        match old.sa_sigaction {
            libc::SIG_DFL => Disposition::Default,
            libc::SIG_IGN => Disposition::Ignored,
            _ => Disposition::Handled,
        }
    }

    fn watched(self) -> bool {
        self != Disposition::Ignored
    }

    fn reraise(self) -> bool {
        self == Disposition::Default
    }
}

#[cfg(unix)]
fn install_signal_listener() {
    use signal_hook::iterator::Signals;

    let plan: Vec<(libc::c_int, Disposition)> = [libc::SIGINT, libc::SIGTERM]
        .into_iter()
        .map(|raw| (raw, Disposition::current(raw)))
        .filter(|(_, disposition)| disposition.watched())
        .collect();

    if plan.is_empty() {
        tracing::debug!("Host ignores SIGINT and SIGTERM, not forwarding signals to the sidecar");
        return;
    }

    let mut signals = match Signals::new(plan.iter().map(|(raw, _)| *raw)) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::warn!("Failed to register sidecar signal handlers: {}", e);
            return;
        }
    };

    let spawned = std::thread::Builder::new()
        .name("tier-sidecar-signals".to_string())
        .spawn(move || {
            for raw in signals.forever() {
                handle_global_exit(Signal::from_raw(raw));

                let reraise = plan
                    .iter()
                    .any(|(watched, disposition)| *watched == raw && disposition.reraise());
                if !reraise {
                    continue;
                }
                if let Err(e) = signal_hook::low_level::emulate_default_handler(raw) {
                    tracing::warn!("Failed to re-raise signal {}: {}", raw, e);
                }
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Failed to start sidecar signal thread: {}", e);
    }
}
