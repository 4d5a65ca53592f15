pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{Article, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Optional filters for [`ArticleStore::query`]. All set filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleFilter {
    pub source: Option<String>,
    pub category: Option<String>,
    /// Only articles first seen at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        self.source.as_ref().map_or(true, |s| &article.source == s)
            && self
                .category
                .as_ref()
                .map_or(true, |c| article.category.as_ref() == Some(c))
            && self.since.map_or(true, |since| article.first_seen >= since)
    }
}

/// Title and body of a recently stored article, for near-duplicate checks.
#[derive(Debug, Clone)]
pub struct RecentEntry {
    pub title: String,
    pub body: String,
}

/// Persisted article store keyed by fingerprint. Implementations must be safe
/// to call from concurrent tasks; `insert` is the uniqueness backstop.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn exists(&self, fingerprint: &str) -> StoreResult<bool>;

    /// Whether an article with this canonical link is already stored.
    async fn exists_link(&self, link: &str) -> StoreResult<bool>;

    /// Fails with [`StoreError::DuplicateKey`] if the fingerprint is present.
    async fn insert(&self, article: &Article) -> StoreResult<()>;

    async fn attach_summary(
        &self,
        fingerprint: &str,
        summary: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Delete articles first seen before `cutoff`, returning how many went.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    /// Newest first-seen first.
    async fn query(&self, filter: &ArticleFilter) -> StoreResult<Vec<Article>>;

    async fn recent_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<RecentEntry>>;

    /// Articles still lacking a summary, oldest first.
    async fn unsummarized(&self, limit: usize) -> StoreResult<Vec<Article>>;

    /// Distinct source names present in the store.
    async fn sources(&self) -> StoreResult<Vec<String>>;

    async fn count(&self) -> StoreResult<usize>;
}
