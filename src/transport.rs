//! Authenticated HTTP transport.
//!
//! Defines the [`Transport`] trait used by every remote call in the crate,
//! and [`HttpTransport`], the reqwest-backed implementation that attaches
//! the bearer token. Keeping the seam at the request level lets tests drive
//! the upload coordinator with scripted responses instead of a live server.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::Credentials;
use crate::error::Result;

/// Default per-request timeout, generous because upload shards can be
/// several megabytes.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// A response from the Atlas API: status code plus the raw body text.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// The server's human-readable failure message: the JSON `detail`
    /// field when present, otherwise the raw body.
    pub fn detail(&self) -> String {
        self.json()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str().map(String::from)))
            .unwrap_or_else(|| self.body.clone())
    }
}

/// Issues authenticated requests against the Atlas API.
///
/// Implementations return `Ok` for any HTTP response the server produced,
/// regardless of status code; `Err` means the request never completed
/// (connection refused, timeout, TLS failure).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<ApiResponse>;
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse>;
}

/// Production transport: reqwest client with a bearer token.
pub struct HttpTransport {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: credentials.api_base(),
            token: credentials.token.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse::new(status, body))
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_prefers_json_detail_field() {
        let resp = ApiResponse::new(400, r#"{"detail": "Project transaction lock is held"}"#);
        assert_eq!(resp.detail(), "Project transaction lock is held");
    }

    #[test]
    fn detail_falls_back_to_raw_body() {
        let resp = ApiResponse::new(502, "Bad Gateway");
        assert_eq!(resp.detail(), "Bad Gateway");
        assert!(resp.json().is_none());
    }

    #[test]
    fn success_is_exactly_200() {
        assert!(ApiResponse::new(200, "{}").is_success());
        assert!(!ApiResponse::new(201, "{}").is_success());
        assert!(!ApiResponse::new(504, "").is_success());
    }
}
