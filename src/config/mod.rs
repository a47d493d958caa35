//! Connection resolution for the Tier client.
//!
//! Decides where the client connects from call-site options and the process
//! environment. Precedence for the base URL:
//!
//! 1. `GetClientOptions::base_url`
//! 2. `TIER_BASE_URL`
//! 3. [`PRODUCTION_BASE_URL`], when an API key is available
//! 4. a local sidecar, when the caller opted in with `GetClientOptions::sidecar`
//!
//! Anything else is a [`ConfigError::MissingEndpoint`].

pub(crate) mod helpers;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::config::helpers::{debug_enabled, optional_env};
use crate::error::ConfigError;
use crate::get_client::GetClientOptions;

/// Endpoint used when only an API key is configured.
pub const PRODUCTION_BASE_URL: &str = "https://api.tier.run";

/// Where the resolved base URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    /// `GetClientOptions::base_url`.
    Options,
    /// `TIER_BASE_URL`.
    Environment,
    /// Derived from the presence of an API key.
    Production,
    /// A locally spawned `tier serve` process.
    Sidecar,
}

impl std::fmt::Display for EndpointSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Options => write!(f, "options"),
            Self::Environment => write!(f, "environment"),
            Self::Production => write!(f, "production"),
            Self::Sidecar => write!(f, "sidecar"),
        }
    }
}

/// Effective connection parameters handed to the client factory.
#[derive(Clone)]
pub struct ResolvedConfig {
    /// Absolute http(s) URL the client issues requests against.
    pub base_url: Url,
    pub api_key: Option<SecretString>,
    pub debug: bool,
    pub source: EndpointSource,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.is_some())
            .field("debug", &self.debug)
            .field("source", &self.source)
            .finish()
    }
}

impl ResolvedConfig {
    /// Config pointing at a sidecar that is already listening on `base_url`.
    pub fn for_sidecar(base_url: Url, debug: bool) -> Self {
        Self {
            base_url,
            api_key: None,
            debug,
            source: EndpointSource::Sidecar,
        }
    }
}

/// Outcome of resolution.
#[derive(Debug, Clone)]
pub enum Target {
    /// Connect to a known endpoint.
    Remote(ResolvedConfig),
    /// No endpoint and no credential; a local sidecar must provide one.
    Sidecar { debug: bool },
}

impl Target {
    /// Resolve against the live process environment.
    pub fn resolve(options: &GetClientOptions) -> Result<Self, ConfigError> {
        Self::resolve_with(options, optional_env)
    }

    /// Resolve with an explicit env lookup.
    ///
    /// `env` follows [`optional_env`] semantics: empty values are `None`.
    pub fn resolve_with<F>(options: &GetClientOptions, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let env_base_url = env("TIER_BASE_URL")?;
        let env_api_key = env("TIER_API_KEY")?.map(SecretString::from);
        let verbose = debug_enabled(
            env("TIER_DEBUG")?.as_deref(),
            env("NODE_DEBUG")?.as_deref(),
        );

        let explicit_base_url = options.base_url.clone().filter(|s| !s.is_empty());
        let explicit_api_key = options
            .api_key
            .clone()
            .filter(|k| !k.expose_secret().is_empty());
        let api_key = explicit_api_key.or(env_api_key);

        let (base_url, source) = match (explicit_base_url, env_base_url) {
            (Some(url), _) => (url, EndpointSource::Options),
            (None, Some(url)) => (url, EndpointSource::Environment),
            (None, None) if api_key.is_some() => {
                (PRODUCTION_BASE_URL.to_string(), EndpointSource::Production)
            }
            (None, None) if options.sidecar.is_some() => {
                tracing::debug!("No Tier endpoint or API key configured, using local sidecar");
                return Ok(Self::Sidecar { debug: verbose });
            }
            (None, None) => return Err(ConfigError::MissingEndpoint),
        };

        let key = match source {
            EndpointSource::Options => "base_url",
            _ => "TIER_BASE_URL",
        };
        let base_url = parse_base_url(key, &base_url)?;

        tracing::debug!(
            base_url = %base_url,
            source = %source,
            api_key = api_key.is_some(),
            debug = verbose,
            "Resolved Tier endpoint"
        );

        Ok(Self::Remote(ResolvedConfig {
            base_url,
            api_key,
            debug: verbose,
            source,
        }))
    }
}

/// Parse a base URL, requiring an absolute http(s) URL.
pub(crate) fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not an absolute URL: {e}"),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' must use http:// or https://"),
        });
    }

    Ok(url)
}
