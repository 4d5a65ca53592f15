use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Category assigned when no rule matches.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Which adapter variant handles a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "feed")]
    Rss,
    #[serde(alias = "api", alias = "hn")]
    Hackernews,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rss => write!(f, "rss"),
            SourceKind::Hackernews => write!(f, "hackernews"),
        }
    }
}

/// A configured content source. Immutable for the duration of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default = "default_enabled", deserialize_with = "deserialize_flag")]
    pub enabled: bool,
    /// Upper bound on entries taken from this source per cycle.
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Fetch the linked page when the feed only carries a short excerpt.
    #[serde(default)]
    pub full_text: bool,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            enabled: true,
            max_items: None,
            full_text: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

fn default_enabled() -> bool {
    true
}

/// Accepts `true`/`false` as well as the strings "true"/"false" that hand-edited
/// YAML files tend to contain.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid enabled flag: {}", other))),
        },
    }
}

/// A transient entry produced by a source adapter, not yet deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub fingerprint: String,
    pub source: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub published_at: DateTime<Utc>,
    pub category: Option<String>,
    pub ai_summary: Option<String>,
    pub summarized_at: Option<DateTime<Utc>>,
    pub first_seen: DateTime<Utc>,
}

impl Article {
    /// Promote a candidate that passed deduplication.
    pub fn from_candidate(candidate: Candidate, fingerprint: String, first_seen: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            source: candidate.source,
            title: candidate.title,
            body: candidate.body,
            link: candidate.link,
            published_at: candidate.published_at,
            category: None,
            ai_summary: None,
            summarized_at: None,
            first_seen,
        }
    }

    pub fn has_summary(&self) -> bool {
        self.ai_summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// HTTP behaviour shared by all adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
    pub max_concurrent_fetches: usize,
    pub source_timeout_seconds: u64,
    pub min_request_spacing_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; news-aggregator/0.1)".to_string(),
            timeout_seconds: 15,
            max_retries: 1,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
            max_redirects: 5,
            max_concurrent_fetches: 5,
            source_timeout_seconds: 60,
            min_request_spacing_ms: 500,
        }
    }
}

/// Outcome of one adapter run.
#[derive(Debug, Default)]
pub struct AdapterOutput {
    pub candidates: Vec<Candidate>,
    pub soft_failures: Vec<SoftParseError>,
}

/// Per-source slice of a cycle report. Finalized once every candidate from the
/// source has gone through deduplication and persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub new_articles: usize,
    pub duplicates: usize,
    pub soft_failures: usize,
    pub store_errors: usize,
    pub errors: Vec<String>,
    pub failed: bool,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }
}

/// Ephemeral per-cycle statistics. Logged and exposed through the status
/// snapshot, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources: Vec<SourceReport>,
    pub summarized: usize,
    pub summaries_unavailable: usize,
    pub pruned: usize,
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            sources: Vec::new(),
            summarized: 0,
            summaries_unavailable: 0,
            pruned: 0,
            errors: Vec::new(),
        }
    }

    /// Report for `name`, appended if the source has none yet.
    pub fn source_entry(&mut self, name: &str) -> &mut SourceReport {
        let index = match self.sources.iter().position(|s| s.source == name) {
            Some(index) => index,
            None => {
                self.sources.push(SourceReport::new(name));
                self.sources.len() - 1
            }
        };
        &mut self.sources[index]
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == name)
    }

    pub fn fetched(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }

    pub fn new_articles(&self) -> usize {
        self.sources.iter().map(|s| s.new_articles).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.sources.iter().map(|s| s.duplicates).sum()
    }

    pub fn soft_failures(&self) -> usize {
        self.sources.iter().map(|s| s.soft_failures).sum()
    }

    pub fn store_errors(&self) -> usize {
        self.sources.iter().map(|s| s.store_errors).sum()
    }

    pub fn failed_sources(&self) -> Vec<&SourceReport> {
        self.sources.iter().filter(|s| s.failed).collect()
    }

    /// At least one source delivered, or there was nothing to fetch.
    pub fn is_successful(&self) -> bool {
        self.sources.is_empty() || self.sources.iter().any(|s| !s.failed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Malformed feed: {0}")]
    Malformed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    TooLarge { size_mb: usize },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("No adapter registered for source type '{0}'")]
    NoAdapter(SourceKind),

    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

/// A single malformed entry inside an otherwise valid feed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("skipped entry {index}: {reason}")]
pub struct SoftParseError {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate fingerprint: {0}")]
    DuplicateKey(String),

    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// The summarizer gave up. The article is kept without a summary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Summary unavailable: {reason}")]
pub struct SummaryUnavailable {
    pub reason: String,
}

impl SummaryUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A cycle is already in progress")]
    CycleInProgress,

    #[error("Cycle guard is closed")]
    GuardClosed,
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
