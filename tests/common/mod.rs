//! Shared test doubles for the integration suite.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use challenge_core::error::{PipelineError, Result};
use challenge_core::orchestration::{FetchedPayload, RemoteFetcher};

/// URL-routed fetcher. Responses are registered per URL; a request for an
/// unregistered URL fails with a transport error, which is also how the
/// paginated tests signal "no more pages".
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, FetchedPayload>>,
    requests: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, status: u16, content_type: Option<&str>, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            FetchedPayload {
                status,
                content_type: content_type.map(ToString::to_string),
                body: body.to_string(),
            },
        );
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn lookup(&self, url: &str) -> Result<FetchedPayload> {
        self.requests.lock().unwrap().push(url.to_string());
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::Transport(format!("no route for '{url}'")))
    }
}

#[async_trait]
impl RemoteFetcher for MockFetcher {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedPayload> {
        self.lookup(url)
    }

    async fn post_form(
        &self,
        url: &str,
        _form: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<FetchedPayload> {
        self.lookup(url)
    }
}
