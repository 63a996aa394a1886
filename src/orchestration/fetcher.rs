//! # Remote Fetch Abstraction
//!
//! Thin seam over the HTTP client so tests never hit the network. The
//! fetcher reports status code, content type, and body; interpreting them
//! (non-success statuses, content-type checks, pagination) stays in the
//! orchestrator.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// One fetched response, reduced to what the pipeline inspects
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPayload {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP operations the pipeline performs against remote geodata services
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// GET a document (remote GeoJSON, paginated or not)
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPayload>;

    /// POST form fields (Overpass interpreter queries)
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<FetchedPayload>;
}

/// reqwest-backed fetcher with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn into_payload(response: reqwest::Response) -> Result<FetchedPayload> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = response.text().await?;
        Ok(FetchedPayload {
            status,
            content_type,
            body,
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPayload> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        Self::into_payload(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<FetchedPayload> {
        let response = self
            .client
            .post(url)
            .form(form)
            .timeout(timeout)
            .send()
            .await?;
        Self::into_payload(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let payload = FetchedPayload {
            status: 200,
            content_type: None,
            body: String::new(),
        };
        assert!(payload.is_success());

        let payload = FetchedPayload {
            status: 404,
            content_type: None,
            body: String::new(),
        };
        assert!(!payload.is_success());

        let payload = FetchedPayload {
            status: 299,
            content_type: None,
            body: String::new(),
        };
        assert!(payload.is_success());
    }
}
