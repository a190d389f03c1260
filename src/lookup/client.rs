//! HTTP client creation and JSON request handling.

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use reqwest::header;
use serde_json::Value;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::TARGET_WEB_REQUEST;

/// Wikimedia asks API clients to identify themselves.
const USER_AGENT: &str = concat!(
    "wikipulse/",
    env!("CARGO_PKG_VERSION"),
    " (breaking news detection from recent changes)"
);

/// Anything that can GET a URL and hand back parsed JSON. The seam lets the
/// lookups and social networks run against canned responses in tests.
pub trait JsonFetcher: Send + Sync {
    fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>>;

    /// Same as [`JsonFetcher::get_json`] with a bearer token attached.
    fn get_json_authorized<'a>(
        &'a self,
        url: &'a str,
        _token: &'a str,
    ) -> BoxFuture<'a, Result<Value>> {
        self.get_json(url)
    }
}

/// Create the shared client used for every outbound request.
pub fn create_http_client() -> Result<reqwest::Client> {
    debug!(target: TARGET_WEB_REQUEST, "Creating HTTP client");
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
}

/// [`JsonFetcher`] backed by reqwest, with every request bounded by a timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            request_timeout,
        })
    }

    async fn fetch(&self, url: &str, token: Option<&str>) -> Result<Value> {
        debug!(target: TARGET_WEB_REQUEST, "Requesting {}", url);

        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| {
                anyhow!(
                    "Request to {} timed out after {} seconds",
                    url,
                    self.request_timeout.as_secs()
                )
            })?
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error {} from {}", status, url));
        }

        let body = timeout(self.request_timeout, response.json::<Value>())
            .await
            .map_err(|_| anyhow!("Reading {} timed out", url))?
            .with_context(|| format!("Invalid JSON from {}", url))?;

        debug!(target: TARGET_WEB_REQUEST, "Request to {} succeeded", url);
        Ok(body)
    }
}

impl JsonFetcher for HttpFetcher {
    fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(self.fetch(url, None))
    }

    fn get_json_authorized<'a>(
        &'a self,
        url: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(self.fetch(url, Some(token)))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Canned-response fetcher shared by the lookup, social and monitor tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves responses by URL substring; unmatched URLs fail.
    #[derive(Default)]
    pub struct FakeFetcher {
        responses: Vec<(String, Value)>,
        pub requests: Mutex<Vec<String>>,
        pub tokens: Mutex<HashMap<String, String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, url_fragment: &str, body: Value) -> Self {
            self.responses.push((url_fragment.to_string(), body));
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl JsonFetcher for FakeFetcher {
        fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>> {
            self.requests.lock().unwrap().push(url.to_string());
            let found = self
                .responses
                .iter()
                .find(|(fragment, _)| url.contains(fragment.as_str()))
                .map(|(_, body)| body.clone());
            Box::pin(async move { found.ok_or_else(|| anyhow!("no canned response")) })
        }

        fn get_json_authorized<'a>(
            &'a self,
            url: &'a str,
            token: &'a str,
        ) -> BoxFuture<'a, Result<Value>> {
            self.tokens
                .lock()
                .unwrap()
                .insert(url.to_string(), token.to_string());
            self.get_json(url)
        }
    }
}
