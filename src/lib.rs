//! Tier API client bootstrap.
//!
//! [`get_client`] decides where a Tier client connects (an explicit URL, the
//! hosted API, or a local `tier serve` sidecar it starts on demand) and
//! builds the client.
//!
//! ```rust,no_run
//! # async fn demo() -> tier_client::Result<()> {
//! use tier_client::{GetClientOptions, get_client};
//!
//! let client = get_client(GetClientOptions::default()).await?;
//! let who = client.whoami().await?;
//! println!("{who}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod get_client;
pub mod sidecar;
pub mod testing;

pub use client::{ClientOptions, Fetch, TierClient};
pub use config::{EndpointSource, PRODUCTION_BASE_URL, ResolvedConfig, Target};
pub use error::{ClientError, ConfigError, Error, Result};
pub use get_client::{GetClientOptions, get_client, get_client_with};
pub use sidecar::{SidecarConfig, SidecarError, SidecarManager, SidecarState};
