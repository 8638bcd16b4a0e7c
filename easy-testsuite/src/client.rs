//! HTTP client for a running service under test

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered response of the service under test
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl ClientResponse {
    /// Header value as text; missing or non-UTF-8 values read as `None`
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    base_url: String,
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse> {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn get_with_params(&self, path: &str, params: &[(&str, &str)]) -> Result<ClientResponse> {
        self.send(self.client.get(self.url(path)).query(params)).await
    }

    pub async fn post(&self, path: &str) -> Result<ClientResponse> {
        self.send(self.client.post(self.url(path))).await
    }

    pub async fn post_with_params(&self, path: &str, params: &[(&str, &str)]) -> Result<ClientResponse> {
        self.send(self.client.post(self.url(path)).query(params)).await
    }

    pub async fn post_body(&self, path: &str, body: impl Into<String>) -> Result<ClientResponse> {
        self.send(self.client.post(self.url(path)).body(body.into())).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ClientResponse> {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        debug!("Service answered {} ({} bytes)", status, text.len());
        Ok(ClientResponse {
            status,
            headers,
            text,
        })
    }
}
