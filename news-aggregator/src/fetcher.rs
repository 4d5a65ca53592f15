use crate::parser::extract_article_text;
use crate::types::{AggregatorError, FetchConfig, FetchError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;

/// Shared HTTP client for every adapter: timeouts, bounded retries with
/// exponential backoff, and per-host request spacing.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: RateLimiter,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(AggregatorError::Http)?;

        let rate_limiter = RateLimiter::new(Duration::from_millis(config.min_request_spacing_ms));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET `url` and return the body as text.
    ///
    /// Transport errors and 5xx/429 responses are retried up to
    /// `max_retries` times. Other non-success statuses fail immediately.
    pub async fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.fetch_text_with_retries(url, self.config.max_retries).await
    }

    async fn fetch_text_with_retries(
        &self,
        url: &str,
        max_retries: u32,
    ) -> std::result::Result<String, FetchError> {
        let response = self.get_with_retries(url, max_retries).await?;

        if let Some(content_length) = response.content_length() {
            let size_mb = content_length as usize / (1024 * 1024);
            if size_mb > self.config.max_feed_size_mb {
                return Err(FetchError::TooLarge { size_mb });
            }
        }

        let content = response.text().await?;
        debug!("Fetched {} ({} bytes)", url, content.len());
        Ok(content)
    }

    /// GET `url` and decode the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, FetchError> {
        let response = self.get_with_retries(url, self.config.max_retries).await?;
        let value = response.json::<T>().await?;
        Ok(value)
    }

    /// Fetch a linked article page and extract its readable text. `Ok(None)`
    /// when the page has too little prose to be worth keeping. Pages get a
    /// single attempt.
    pub async fn fetch_page_text(
        &self,
        url: &str,
    ) -> std::result::Result<Option<String>, FetchError> {
        let page = self.fetch_text_with_retries(url, 0).await?;
        Ok(extract_article_text(&page))
    }

    async fn get_with_retries(
        &self,
        url: &str,
        max_retries: u32,
    ) -> std::result::Result<Response, FetchError> {
        let parsed = Url::parse(url)?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let retry_delay = Duration::from_secs(self.config.retry_delay_seconds);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: retry_delay,
            initial_interval: retry_delay,
            max_interval: retry_delay * 32,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempts = 0;
        loop {
            self.rate_limiter.wait(&host).await;
            attempts += 1;

            let err = match self.client.get(parsed.clone()).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let err = FetchError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    };
                    if !is_retryable_status(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => FetchError::Http(e),
            };

            let delay = if attempts <= max_retries {
                backoff.next_backoff()
            } else {
                None
            };
            match delay {
                Some(delay) => {
                    warn!(
                        "Attempt {} failed for {}: {}, retrying in {:?}",
                        attempts, url, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!("Failed to fetch {} after {} attempts", url, attempts);
                    return Err(err);
                }
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Keeps at least `spacing` between requests to the same host. The next slot
/// is reserved under the lock and the wait happens outside it, so requests to
/// other hosts are never held up.
pub struct RateLimiter {
    spacing: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub async fn wait(&self, host: &str) {
        if self.spacing.is_zero() {
            return;
        }

        let now = Instant::now();
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let slot = slots.get(host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.to_string(), slot + self.spacing);
            slot
        };

        if slot > now {
            debug!("Rate limiting {}: waiting {:?}", host, slot - now);
            tokio::time::sleep_until(slot).await;
        }
    }
}
