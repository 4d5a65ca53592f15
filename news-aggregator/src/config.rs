use crate::categorizer::CategoryRule;
use crate::llm_adapter::SummaryStyle;
use crate::types::{AggregatorError, FetchConfig, Result, Source};
use crate::utils::url::is_valid_feed_url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/sources.yaml";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/articles.db";
pub const MAX_CONCURRENT_FETCHES: usize = 8;

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(alias = "cycle_interval_minutes", default = "default_interval")]
    pub scrape_interval_minutes: u64,
    #[serde(default = "default_retention")]
    pub retention_days: u32,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    /// Priority-ordered category rules; the built-in set applies when absent.
    #[serde(default)]
    pub categories: Option<Vec<CategoryRule>>,
    #[serde(default)]
    pub web: Option<WebConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Characters of normalized body that enter the fingerprint.
    pub excerpt_chars: usize,
    /// `None` disables near-duplicate title checks.
    pub similarity_threshold: Option<f64>,
    pub similarity_window_days: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 500,
            similarity_threshold: Some(0.85),
            similarity_window_days: 3,
        }
    }
}

/// Ollama endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    #[serde(default, deserialize_with = "SummaryStyle::deserialize_lenient")]
    pub summary_style: SummaryStyle,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_llm_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_llm_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_llm_pause")]
    pub pause_between_ms: u64,
    #[serde(default = "default_backlog_limit")]
    pub backlog_limit: usize,
}

impl LlmConfig {
    pub fn new(host: impl Into<String>, port: u16, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            model: model.into(),
            summary_style: SummaryStyle::default(),
            timeout_seconds: default_llm_timeout(),
            max_attempts: default_llm_attempts(),
            retry_delay_ms: default_llm_retry_delay(),
            pause_between_ms: default_llm_pause(),
            backlog_limit: default_backlog_limit(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub bind: String,
}

fn default_interval() -> u64 {
    60
}

fn default_retention() -> u32 {
    7
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_llm_attempts() -> u32 {
    2
}

fn default_llm_retry_delay() -> u64 {
    1000
}

fn default_llm_pause() -> u64 {
    2000
}

fn default_backlog_limit() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scrape_interval_minutes: default_interval(),
            retention_days: default_retention(),
            database_url: default_database_url(),
            sources: Vec::new(),
            fetch: FetchConfig::default(),
            dedup: DedupConfig::default(),
            llm: None,
            categories: None,
            web: None,
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        info!(
            "Loaded configuration: {} sources ({} enabled)",
            config.sources.len(),
            config.enabled_sources().count()
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scrape_interval_minutes == 0 {
            return Err(AggregatorError::Config(
                "scrape_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.retention_days == 0 {
            return Err(AggregatorError::Config(
                "retention_days must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_concurrent_fetches == 0
            || self.fetch.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
        {
            return Err(AggregatorError::Config(format!(
                "fetch.max_concurrent_fetches must be between 1 and {}",
                MAX_CONCURRENT_FETCHES
            )));
        }
        if let Some(threshold) = self.dedup.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(AggregatorError::Config(
                    "dedup.similarity_threshold must be within 0.0..=1.0".to_string(),
                ));
            }
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AggregatorError::Config("source with empty name".to_string()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(AggregatorError::Config(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
            // API sources may leave the url empty and fall back to the public endpoint.
            let needs_url = !source.url.trim().is_empty()
                || source.kind == crate::types::SourceKind::Rss;
            if needs_url && !is_valid_feed_url(&source.url) {
                return Err(AggregatorError::Config(format!(
                    "source {} has invalid url: {}",
                    source.name, source.url
                )));
            }
        }

        if let Some(llm) = &self.llm {
            if llm.max_attempts == 0 {
                return Err(AggregatorError::Config(
                    "llm.max_attempts must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn category_rules(&self) -> Vec<CategoryRule> {
        self.categories
            .clone()
            .unwrap_or_else(crate::categorizer::default_rules)
    }

    /// `NEWS_DATABASE_URL` wins over the file.
    pub fn resolved_database_url(&self) -> String {
        std::env::var("NEWS_DATABASE_URL").unwrap_or_else(|_| self.database_url.clone())
    }
}
