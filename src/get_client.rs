//! Top-level entry point: resolve where to connect and build a client.

use secrecy::SecretString;

use crate::client::{ClientOptions, TierClient};
use crate::config::{ResolvedConfig, Target, parse_base_url};
use crate::error::Result;
use crate::sidecar::{SidecarConfig, SidecarManager};

/// Call-site options for [`get_client`].
///
/// Every field is optional. `base_url` and `api_key` override `TIER_BASE_URL`
/// and `TIER_API_KEY`; `client` is passed through to [`TierClient::new`]
/// unchanged.
#[derive(Clone, Default)]
pub struct GetClientOptions {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    /// Start a local `tier serve` sidecar when neither a base URL nor an API
    /// key is configured.
    pub sidecar: Option<SidecarConfig>,
    pub client: ClientOptions,
}

impl std::fmt::Debug for GetClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetClientOptions")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.is_some())
            .field("sidecar", &self.sidecar)
            .field("client", &self.client)
            .finish()
    }
}

/// Build a Tier client.
///
/// Resolves the endpoint from `options` and the environment. If that routes
/// to the sidecar, the process-wide [`SidecarManager`] is started (or
/// reused) and its local URL becomes the base URL.
pub async fn get_client(options: GetClientOptions) -> Result<TierClient> {
    let target = Target::resolve(&options)?;

    let config = match target {
        Target::Remote(config) => config,
        Target::Sidecar { debug } => {
            let sidecar = options.sidecar.clone().unwrap_or_default();
            sidecar_config(SidecarManager::global(&sidecar), debug).await?
        }
    };

    Ok(TierClient::new(config, options.client)?)
}

/// Like [`get_client`], using `manager` for the sidecar path.
pub async fn get_client_with(
    options: GetClientOptions,
    manager: &SidecarManager,
) -> Result<TierClient> {
    let config = match Target::resolve(&options)? {
        Target::Remote(config) => config,
        Target::Sidecar { debug } => sidecar_config(manager, debug).await?,
    };

    Ok(TierClient::new(config, options.client)?)
}

async fn sidecar_config(manager: &SidecarManager, debug: bool) -> Result<ResolvedConfig> {
    let endpoint = manager.ensure_ready().await?;
    let base_url = parse_base_url("sidecar", &endpoint.http_url())?;
    Ok(ResolvedConfig::for_sidecar(base_url, debug))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::EndpointSource;
    use crate::error::{ConfigError, Error};
    use crate::sidecar::HealthCheck;
    use crate::testing::{ENV_MUTEX, RecordingSignaler, StubBehavior, StubLauncher};

    fn clear_tier_env() {
        // SAFETY: Only called under ENV_MUTEX in tests.
        unsafe {
            std::env::remove_var("TIER_BASE_URL");
            std::env::remove_var("TIER_API_KEY");
            std::env::remove_var("TIER_DEBUG");
            std::env::remove_var("NODE_DEBUG");
        }
    }

    fn stub_manager(behavior: StubBehavior) -> (SidecarManager, Arc<StubLauncher>) {
        let launcher = Arc::new(StubLauncher::new(behavior));
        let config = SidecarConfig {
            health_check: HealthCheck::None,
            startup_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let manager =
            SidecarManager::with_parts(config, launcher.clone(), Arc::new(RecordingSignaler::new()));
        (manager, launcher)
    }

    fn with_sidecar() -> GetClientOptions {
        GetClientOptions {
            sidecar: Some(SidecarConfig::default()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn api_key_only_uses_production() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_tier_env();

        let options = GetClientOptions {
            api_key: Some(SecretString::from("k_test".to_string())),
            ..Default::default()
        };
        let client = get_client(options).await.unwrap();

        assert_eq!(client.base_url().as_str(), "https://api.tier.run/");
        assert!(client.has_api_key());
        assert!(!client.debug());
        assert_eq!(client.source(), EndpointSource::Production);
    }

    #[tokio::test]
    async fn env_base_url_never_touches_sidecar() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_tier_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("TIER_BASE_URL", "http://localhost:9999");
        }

        let (manager, launcher) = stub_manager(StubBehavior::Running);
        let client = get_client_with(with_sidecar(), &manager).await.unwrap();

        assert_eq!(client.base_url().as_str(), "http://localhost:9999/");
        assert_eq!(launcher.spawn_count(), 0);

        clear_tier_env();
    }

    #[tokio::test]
    async fn missing_everything_fails_before_spawning() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_tier_env();

        let (manager, launcher) = stub_manager(StubBehavior::Running);
        let err = get_client_with(GetClientOptions::default(), &manager)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::MissingEndpoint)));
        assert_eq!(launcher.spawn_count(), 0);
    }

    #[tokio::test]
    async fn sidecar_provides_base_url_once() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_tier_env();

        let (manager, launcher) = stub_manager(StubBehavior::Running);

        let first = get_client_with(with_sidecar(), &manager).await.unwrap();
        let second = get_client_with(with_sidecar(), &manager).await.unwrap();

        assert_eq!(first.base_url(), second.base_url());
        assert_eq!(first.base_url().host_str(), Some("127.0.0.1"));
        assert_eq!(first.source(), EndpointSource::Sidecar);
        assert!(!first.has_api_key());
        assert_eq!(launcher.spawn_count(), 1);
    }

    #[tokio::test]
    async fn sidecar_failure_surfaces_undecorated() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_tier_env();

        let (manager, _) = stub_manager(StubBehavior::SpawnError);
        let err = get_client_with(with_sidecar(), &manager).await.unwrap_err();

        match err {
            Error::Sidecar(e) => assert!(e.is_spawn_failure()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sidecar_client_keeps_debug_flag() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_tier_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NODE_DEBUG", "tier");
        }

        let (manager, _) = stub_manager(StubBehavior::Running);
        let client = get_client_with(with_sidecar(), &manager).await.unwrap();
        assert!(client.debug());

        clear_tier_env();
    }
}
