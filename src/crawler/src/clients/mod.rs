//! HTTP implementations of the remote services
//!
//! `GoogleIamClient` serves role listings, role lookups, and the testable-permission catalog;
//! `ResourceManagerClient` serves organization lookups and project listings. Both share
//! `RestClient` for request building and status mapping.

mod iam;
mod resource_manager;

pub use iam::GoogleIamClient;
pub use resource_manager::ResourceManagerClient;

use reqwest::{Client, RequestBuilder, Response};
use rolemap_core::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default IAM endpoint
pub const IAM_BASE_URL: &str = "https://iam.googleapis.com";

/// Default resource manager endpoint
pub const RESOURCE_MANAGER_BASE_URL: &str = "https://cloudresourcemanager.googleapis.com";

/// Settings shared by the HTTP clients
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Service root, without a trailing slash
    pub base_url: String,

    /// Bearer token attached to every request
    pub access_token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// reqwest client bound to one service root
#[derive(Clone)]
pub(crate) struct RestClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl RestClient {
    pub(crate) fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CoreError::configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send `request` and decode a success body as `T`
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| CoreError::transport(e.to_string()))?;

        let response = check_status(response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| CoreError::transport(format!("failed to read response body: {}", e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| CoreError::serialization(format!("unexpected response body: {}", e)))
    }
}

/// Map a non-success answer to `CoreError::Remote`, preferring the service's error message
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let text = response.text().await.unwrap_or_default();
    debug!("{} answered {}: {}", url, status, text);

    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    Err(CoreError::remote(status.as_u16(), message))
}

/// Query parameters of a paged request
pub(crate) fn page_query(page_token: Option<&str>, page_size: Option<u32>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(token) = page_token.filter(|t| !t.is_empty()) {
        query.push(("pageToken", token.to_string()));
    }
    if let Some(size) = page_size {
        query.push(("pageSize", size.to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = RestClient::new(HttpClientConfig::new("http://localhost:8080/")).unwrap();
        assert_eq!(client.url("/v1/roles"), "http://localhost:8080/v1/roles");
        assert_eq!(
            client.url("v1/organizations/1/roles"),
            "http://localhost:8080/v1/organizations/1/roles"
        );
    }

    #[test]
    fn test_empty_token_is_not_sent() {
        let config = HttpClientConfig::new(IAM_BASE_URL).with_access_token(Some(String::new()));
        assert!(config.access_token.is_none());

        assert!(page_query(Some(""), None).is_empty());
        assert_eq!(
            page_query(Some("abc"), Some(50)),
            vec![("pageToken", "abc".to_string()), ("pageSize", "50".to_string())]
        );
    }
}
