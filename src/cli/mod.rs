//! CLI command handling.
//!
//! Provides subcommands for:
//! - Showing where the client would connect (`resolve`)
//! - Calling the API to identify the configured account (`whoami`)

use std::path::PathBuf;
use std::time::Duration;

use clap::{ColorChoice, Parser, Subcommand};
use secrecy::SecretString;

use crate::get_client::{GetClientOptions, get_client};
use crate::sidecar::SidecarConfig;

#[derive(Parser, Debug)]
#[command(name = "tier-client")]
#[command(about = "Resolve and exercise a Tier API connection")]
#[command(
    long_about = "Builds a Tier client from flags and TIER_* environment variables.\nExamples:\n  tier-client resolve  # Show the resolved endpoint\n  tier-client --sidecar whoami  # Call the API through a local sidecar"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the Tier API (overrides TIER_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// API key (overrides TIER_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Start a local `tier serve` sidecar when no endpoint is configured
    #[arg(long, global = true)]
    pub sidecar: bool,

    /// Sidecar executable
    #[arg(long, global = true, default_value = "tier")]
    pub tier_bin: PathBuf,

    /// Run the sidecar in live mode
    #[arg(long, global = true)]
    pub live: bool,

    /// Port for the sidecar (0 picks a free port)
    #[arg(long, global = true, default_value = "0")]
    pub port: u16,

    /// Seconds to wait for the sidecar to become ready
    #[arg(long, global = true, default_value = "30")]
    pub startup_timeout: u64,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the resolved endpoint without calling the API
    Resolve,

    /// Call GET /v1/whoami and print the response
    Whoami,
}

impl Cli {
    /// Translate flags into [`GetClientOptions`].
    pub fn client_options(&self) -> GetClientOptions {
        let sidecar = self.sidecar.then(|| SidecarConfig {
            program: self.tier_bin.clone(),
            port: self.port,
            live: self.live,
            startup_timeout: Duration::from_secs(self.startup_timeout),
            ..Default::default()
        });

        GetClientOptions {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone().map(SecretString::from),
            sidecar,
            ..Default::default()
        }
    }
}

/// Run a CLI command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = get_client(cli.client_options()).await?;
    tracing::debug!(?client, "Client ready");

    match cli.command {
        Command::Resolve => {
            println!("base_url: {}", client.base_url());
            println!("source:   {}", client.source());
            println!(
                "api_key:  {}",
                if client.has_api_key() { "set" } else { "unset" }
            );
            println!("debug:    {}", client.debug());
        }
        Command::Whoami => {
            let who = client.whoami().await?;
            println!("{}", serde_json::to_string_pretty(&who)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::error::ConfigError;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version() {
        let cmd = Cli::command();
        assert_eq!(
            cmd.get_version().unwrap_or("unknown"),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_to_options() {
        let cli = Cli::try_parse_from([
            "tier-client",
            "--base-url",
            "http://localhost:9999",
            "--api-key",
            "k_test",
            "resolve",
        ])
        .unwrap();

        let options = cli.client_options();
        assert_eq!(cli.command, Command::Resolve);
        assert_eq!(options.base_url.as_deref(), Some("http://localhost:9999"));
        assert!(options.api_key.is_some());
        assert!(options.sidecar.is_none());
    }

    #[test]
    fn sidecar_flags_build_config() {
        let cli = Cli::try_parse_from([
            "tier-client",
            "whoami",
            "--sidecar",
            "--live",
            "--tier-bin",
            "/opt/tier/bin/tier",
            "--port",
            "8787",
            "--startup-timeout",
            "5",
        ])
        .unwrap();

        let sidecar = cli.client_options().sidecar.unwrap();
        assert_eq!(cli.command, Command::Whoami);
        assert_eq!(sidecar.program, PathBuf::from("/opt/tier/bin/tier"));
        assert_eq!(sidecar.port, 8787);
        assert!(sidecar.live);
        assert_eq!(sidecar.startup_timeout, Duration::from_secs(5));
        assert_eq!(sidecar.host, "127.0.0.1");
    }

    #[test]
    fn empty_api_key_flag_is_ignored() {
        let cli = Cli::try_parse_from(["tier-client", "--api-key", "", "resolve"]).unwrap();

        let result = Target::resolve_with(&cli.client_options(), |_| Ok(None));
        assert_eq!(result.unwrap_err(), ConfigError::MissingEndpoint);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["tier-client"]).is_err());
    }
}
