//! Thin HTTP client producing guardable responses.
//!
//! This is the concrete fetch the resilience layer wraps. Feature code is
//! free to supply any closure to the queue; this client exists so the common
//! case (JSON over HTTP against one backend) needs no boilerplate.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::response::{guard, HttpResponse, SafeResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one base URL
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout.
    ///
    /// A request exceeding the timeout rejects with [`FetchError::Timeout`],
    /// which the retry layer treats as transient.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET request
    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<ClientResponse, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "sending GET");
        let response = self.client.get(&url).send().await?;
        Ok(ClientResponse { inner: response })
    }

    /// Issue a POST request with a JSON body
    #[instrument(skip(self, body))]
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ClientResponse, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "sending POST");
        let response = self.client.post(&url).json(body).send().await?;
        Ok(ClientResponse { inner: response })
    }

    /// GET and guard in one step: the returned response is replayable
    pub async fn get_guarded(&self, path: &str) -> Result<SafeResponse, FetchError> {
        let response = self.get(path).await?;
        guard(response).await
    }

    /// POST and guard in one step
    pub async fn post_json_guarded(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<SafeResponse, FetchError> {
        let response = self.post_json(path, body).await?;
        guard(response).await
    }
}

/// A live reqwest response, guardable exactly once
pub struct ClientResponse {
    inner: reqwest::Response,
}

impl HttpResponse for ClientResponse {
    fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    fn headers(&self) -> HashMap<String, String> {
        self.inner
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect()
    }

    async fn into_body(self) -> Result<Bytes, FetchError> {
        self.inner.bytes().await.map_err(FetchError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new("http://localhost:8000");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_client_with_timeout() {
        let client = HttpClient::with_timeout("http://10.0.0.1:9000", Duration::from_secs(5));
        assert_eq!(client.base_url(), "http://10.0.0.1:9000");
    }
}
