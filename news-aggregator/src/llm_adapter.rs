use crate::config::LlmConfig;
use crate::types::{AggregatorError, Article, Result, SummaryUnavailable};
use crate::utils::text::truncate_chars;
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Article text is cut to this many characters before it goes into a prompt.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 3000;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Summary length/shape. Unknown names fall back to `Standard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    Brief,
    #[default]
    Standard,
    Detailed,
    Bullets,
}

impl SummaryStyle {
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "brief" => SummaryStyle::Brief,
            "detailed" => SummaryStyle::Detailed,
            "bullets" => SummaryStyle::Bullets,
            "standard" => SummaryStyle::Standard,
            other => {
                warn!("Unknown summary style '{}', using standard", other);
                SummaryStyle::Standard
            }
        }
    }

    /// Accepts any string (or nothing) and never fails.
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.map(|n| Self::parse_lenient(&n)).unwrap_or_default())
    }

    pub fn prompt(&self, title: &str, content: &str) -> String {
        let content = truncate_chars(content, MAX_PROMPT_CONTENT_CHARS);
        let (instruction, lead) = match self {
            SummaryStyle::Brief => (
                "Summarize this news article in 1-2 sentences. Be extremely concise - capture only the single most important point.",
                "One-line summary:",
            ),
            SummaryStyle::Standard => (
                "Summarize the following news article in 4-5 concise sentences. Focus on the key facts and main points.",
                "Summary:",
            ),
            SummaryStyle::Detailed => (
                "Provide a comprehensive summary of this news article in 6-8 sentences. Include:\n\
                 - The main news/announcement\n\
                 - Key supporting details and context\n\
                 - Why this matters or potential implications",
                "Detailed summary:",
            ),
            SummaryStyle::Bullets => (
                "Summarize this news article as 3-5 bullet points. Each bullet should be a complete, standalone fact. Use \"•\" as the bullet character.",
                "Key points:",
            ),
        };
        format!(
            "{}\n\nTitle: {}\n\nContent: {}\n\n{}",
            instruction, title, content, lead
        )
    }
}

impl FromStr for SummaryStyle {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SummaryStyle::Brief => "brief",
            SummaryStyle::Standard => "standard",
            SummaryStyle::Detailed => "detailed",
            SummaryStyle::Bullets => "bullets",
        };
        f.write_str(name)
    }
}

/// Best-effort summary generation. Implementations never fail past their own
/// boundary: every problem becomes `SummaryUnavailable`.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn adapter_name(&self) -> String;

    /// Cheap reachability probe run once before a summarizing stage.
    async fn is_available(&self) -> bool;

    async fn summarize(
        &self,
        article: &Article,
        style: SummaryStyle,
    ) -> std::result::Result<String, SummaryUnavailable>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// One failed attempt, and whether another one could help.
struct AttemptError {
    reason: String,
    transient: bool,
}

/// Client for an Ollama server (`/api/generate`, `/api/tags`).
pub struct OllamaSummarizer {
    client: Client,
    config: LlmConfig,
}

impl OllamaSummarizer {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(AggregatorError::Http)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn generate_once(&self, prompt: &str) -> std::result::Result<String, AttemptError> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: 0.2,
                num_predict: 400,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url());
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AttemptError {
                reason: format!("request to {} failed: {}", url, e),
                transient: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                reason: format!("Ollama returned HTTP {}", status),
                transient: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| AttemptError {
            reason: format!("unreadable response: {}", e),
            transient: e.is_timeout(),
        })?;

        let summary = body.response.trim().to_string();
        if summary.is_empty() {
            return Err(AttemptError {
                reason: "empty response".to_string(),
                transient: false,
            });
        }
        Ok(summary)
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    fn adapter_name(&self) -> String {
        format!("ollama ({})", self.config.model)
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url());
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                info!("Ollama not ready: HTTP {}", response.status());
                false
            }
            Err(e) => {
                info!("Ollama not reachable at {}: {}", url, e);
                false
            }
        }
    }

    async fn summarize(
        &self,
        article: &Article,
        style: SummaryStyle,
    ) -> std::result::Result<String, SummaryUnavailable> {
        let prompt = style.prompt(&article.title, &article.body);
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: retry_delay,
            initial_interval: retry_delay,
            max_interval: retry_delay * 8,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let attempts = self.config.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match self.generate_once(&prompt).await {
                Ok(summary) => {
                    debug!("Summarized '{}' ({} chars)", article.title, summary.len());
                    return Ok(summary);
                }
                Err(e) => {
                    warn!(
                        "Summary attempt {}/{} failed for '{}': {}",
                        attempt, attempts, article.title, e.reason
                    );
                    last_reason = e.reason;
                    if !e.transient || attempt == attempts {
                        break;
                    }
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(SummaryUnavailable::new(last_reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_style_falls_back_to_standard() {
        assert_eq!(SummaryStyle::parse_lenient("haiku"), SummaryStyle::Standard);
        assert_eq!(" Bullets ".parse::<SummaryStyle>().unwrap(), SummaryStyle::Bullets);
    }

    #[test]
    fn prompts_differ_per_style_and_truncate_content() {
        let long = "x".repeat(MAX_PROMPT_CONTENT_CHARS + 100);
        let brief = SummaryStyle::Brief.prompt("T", &long);
        let bullets = SummaryStyle::Bullets.prompt("T", &long);

        assert!(brief.ends_with("One-line summary:"));
        assert!(bullets.contains('•'));
        assert_ne!(brief, bullets);
        assert!(!brief.contains(&long));
        assert!(brief.contains(&"x".repeat(MAX_PROMPT_CONTENT_CHARS)));
    }
}
