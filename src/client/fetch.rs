use async_trait::async_trait;

use crate::error::ClientError;

/// Network-call primitive the client sends requests through.
///
/// The default is a [`reqwest::Client`]; callers can inject their own (a
/// shared connection pool, a proxy-aware client, a recording double).
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: reqwest::Request) -> Result<reqwest::Response, ClientError>;
}

#[async_trait]
impl Fetch for reqwest::Client {
    async fn fetch(&self, request: reqwest::Request) -> Result<reqwest::Response, ClientError> {
        Ok(self.execute(request).await?)
    }
}
