//! Local `tier serve` sidecar management.
//!
//! When no Tier endpoint or API key is configured, the client can talk to a
//! sidecar: a `tier serve` process on localhost exposing the same API. The
//! sidecar:
//! - Starts on first request (lazy initialization)
//! - Is started at most once at a time; concurrent callers share the attempt
//! - Remains running for the lifetime of the host process
//! - Is signaled when the host exits (normally or by `SIGINT`/`SIGTERM`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          SidecarManager                              │
//! │                                                                      │
//! │   ensure_ready()                                                     │
//! │         │                                                            │
//! │         ▼                                                            │
//! │   ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐    │
//! │   │ Check State  │────▶│ Reserve Port │────▶│ Spawn tier serve  │    │
//! │   │ (slot)       │     │              │     │ (record pid)      │    │
//! │   └──────────────┘     └──────────────┘     └───────────────────┘    │
//! │                                                    │                 │
//! │                                                    ▼                 │
//! │                                             ┌───────────────────┐    │
//! │                                             │ Poll Health until │    │
//! │                                             │ startup_timeout   │    │
//! │                                             └───────────────────┘    │
//! │                                                                      │
//! │   handle_exit(signal) ◀── atexit / signal thread (exit.rs)           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use tier_client::sidecar::{SidecarConfig, SidecarManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SidecarManager::global(&SidecarConfig::default());
//!
//! // Lazy start on first request
//! let endpoint = manager.ensure_ready().await?;
//! println!("Sidecar available at: {}", endpoint.http_url());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod exit;
pub mod manager;
pub mod process;

pub use config::{HealthCheck, SidecarConfig, SidecarEndpoint};
pub use error::{Result, SidecarError};
pub use manager::{SidecarManager, SidecarState};
pub use process::{CommandLauncher, Launcher, LibcSignaler, SidecarProcess, Signal, Signaler};
