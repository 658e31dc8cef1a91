//! The fetch port: "render a URL and return its fully-loaded HTML" plus raw
//! byte fetches for asset bodies.
//!
//! The trait is the seam where a browser-automation layer would plug in;
//! [`HttpFetcher`] realizes it over plain HTTP. Renders retry with
//! exponential backoff; byte fetches are a single attempt, because failed
//! downloads are picked up by the next run or the repair pass rather than
//! retried in-loop.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::config::CrawlConfig;
use super::errors::FetchError;

/// Raw bytes of one fetched asset body with its HTTP status.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the page-rendering and byte-fetching transport.
#[async_trait]
pub trait FetchPort: Send + Sync {
    /// Render a URL and return its fully-loaded HTML.
    async fn render(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch the full byte body of a URL. The status code is returned with
    /// the body; callers decide what a non-success status means.
    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBody, FetchError>;
}

/// HTTP-backed fetcher used for both page renders and asset downloads.
pub struct HttpFetcher {
    client: Client,
    render_timeout: Duration,
    fetch_timeout: Duration,
    max_render_attempts: u32,
}

impl HttpFetcher {
    pub fn new(cfg: &CrawlConfig) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(&cfg.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            render_timeout: Duration::from_secs(cfg.render_timeout_secs),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs),
            max_render_attempts: cfg.max_render_attempts.max(1),
        })
    }

    async fn render_once(&self, url: &str) -> Result<String, FetchError> {
        let timeout_secs = self.render_timeout.as_secs();
        let response = self
            .client
            .get(url)
            .timeout(self.render_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout_secs, e))?;
        if html.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(html)
    }
}

#[async_trait]
impl FetchPort for HttpFetcher {
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;
        for attempt in 1..=self.max_render_attempts {
            match self.render_once(url).await {
                Ok(html) => {
                    debug!("rendered {} on attempt {}", url, attempt);
                    return Ok(html);
                }
                Err(e) => {
                    warn!("render attempt {} failed for {}: {}", attempt, url, e);
                    last_error = Some(e);
                    if attempt < self.max_render_attempts {
                        sleep(Duration::from_secs(2_u64.pow(attempt - 1))).await;
                    }
                }
            }
        }
        // max_render_attempts >= 1, so at least one error was recorded
        Err(last_error.unwrap_or(FetchError::EmptyBody {
            url: url.to_string(),
        }))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let timeout_secs = self.fetch_timeout.as_secs();
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout_secs, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout_secs, e))?
            .to_vec();
        Ok(FetchedBody { status, body })
    }
}
