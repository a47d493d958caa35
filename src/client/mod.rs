//! Thin Tier API client.
//!
//! [`TierClient::new`] is the only place a client is built: it combines the
//! [`ResolvedConfig`] with the caller's passthrough [`ClientOptions`]. No
//! routing happens here.

mod fetch;

pub use fetch::Fetch;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{EndpointSource, ResolvedConfig};
use crate::error::ClientError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_BYTES: usize = 2000;

/// Options passed through verbatim to client construction.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Network primitive to send requests through. Defaults to a `reqwest::Client`.
    pub fetch: Option<Arc<dyn Fetch>>,
    /// Request timeout for the default fetch.
    pub timeout: Option<Duration>,
    /// User agent for the default fetch.
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("fetch", &self.fetch.is_some())
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Client for the Tier API (remote or sidecar).
#[derive(Clone)]
pub struct TierClient {
    base_url: Url,
    api_key: Option<SecretString>,
    debug: bool,
    source: EndpointSource,
    fetch: Arc<dyn Fetch>,
}

impl std::fmt::Debug for TierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.is_some())
            .field("debug", &self.debug)
            .field("source", &self.source)
            .finish()
    }
}

impl TierClient {
    /// Build a client from resolved connection parameters.
    pub fn new(config: ResolvedConfig, options: ClientOptions) -> Result<Self, ClientError> {
        let fetch = match options.fetch {
            Some(fetch) => fetch,
            None => {
                let user_agent = options
                    .user_agent
                    .unwrap_or_else(|| format!("tier-client/{}", env!("CARGO_PKG_VERSION")));
                let client = reqwest::Client::builder()
                    .timeout(options.timeout.unwrap_or(DEFAULT_TIMEOUT))
                    .user_agent(user_agent)
                    .build()?;
                Arc::new(client) as Arc<dyn Fetch>
            }
        };

        Ok(Self {
            base_url: config.base_url,
            api_key: config.api_key,
            debug: config.debug,
            source: config.source,
            fetch,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Where the base URL came from.
    pub fn source(&self) -> EndpointSource {
        self.source
    }

    /// Join `path` onto the base URL, keeping any path prefix of the base.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');

        Url::parse(&format!("{}/{}", base, path)).map_err(|e| ClientError::InvalidRequest {
            reason: format!("bad path '{path}': {e}"),
        })
    }

    /// Build an authenticated request. Send it with [`TierClient::send`].
    ///
    /// Tier authenticates with HTTP basic auth: the API key is the username
    /// and the password is empty.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::Request, ClientError> {
        let mut request = reqwest::Request::new(method, self.url(path)?);

        if let Some(key) = &self.api_key {
            let credentials = BASE64_STANDARD.encode(format!("{}:", key.expose_secret()));
            let mut value = HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|e| {
                ClientError::InvalidRequest {
                    reason: format!("API key is not a valid header value: {e}"),
                }
            })?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }

    /// Send a request through the configured fetch.
    pub async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, ClientError> {
        let method = request.method().clone();
        let url = request.url().clone();

        if self.debug {
            tracing::info!("tier > {} {}", method, url);
        }

        let response = self.fetch.fetch(request).await?;

        if self.debug {
            tracing::info!("tier < {} {} {}", method, url, response.status());
        }

        Ok(response)
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.request(Method::GET, path)?;
        let url = request.url().to_string();

        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                body: truncate(body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    /// Identify the account behind the configured credentials.
    pub async fn whoami(&self) -> Result<serde_json::Value, ClientError> {
        self.get_json("/v1/whoami").await
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut end = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}
