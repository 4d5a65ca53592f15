use super::{ArticleFilter, ArticleStore, RecentEntry, StoreResult};
use crate::types::{Article, StoreError};
use crate::utils::url::canonical_link;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// In-process store for local runs and tests. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    articles: RwLock<HashMap<String, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn exists(&self, fingerprint: &str) -> StoreResult<bool> {
        Ok(self.articles.read().await.contains_key(fingerprint))
    }

    async fn exists_link(&self, link: &str) -> StoreResult<bool> {
        let key = canonical_link(link);
        let articles = self.articles.read().await;
        Ok(articles
            .values()
            .any(|a| a.link.as_deref().map(canonical_link).as_deref() == Some(key.as_str())))
    }

    async fn insert(&self, article: &Article) -> StoreResult<()> {
        let mut articles = self.articles.write().await;
        if articles.contains_key(&article.fingerprint) {
            return Err(StoreError::DuplicateKey(article.fingerprint.clone()));
        }
        articles.insert(article.fingerprint.clone(), article.clone());
        Ok(())
    }

    async fn attach_summary(
        &self,
        fingerprint: &str,
        summary: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut articles = self.articles.write().await;
        let article = articles
            .get_mut(fingerprint)
            .ok_or_else(|| StoreError::NotFound(fingerprint.to_string()))?;
        article.ai_summary = Some(summary.to_string());
        article.summarized_at = Some(at);
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut articles = self.articles.write().await;
        let before = articles.len();
        articles.retain(|_, a| a.first_seen >= cutoff);
        let removed = before - articles.len();
        debug!("Memory store pruned {} articles", removed);
        Ok(removed)
    }

    async fn query(&self, filter: &ArticleFilter) -> StoreResult<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut matched: Vec<Article> = articles
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.first_seen
                .cmp(&a.first_seen)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<RecentEntry>> {
        let articles = self.articles.read().await;
        Ok(articles
            .values()
            .filter(|a| a.first_seen >= since)
            .map(|a| RecentEntry {
                title: a.title.clone(),
                body: a.body.clone(),
            })
            .collect())
    }

    async fn unsummarized(&self, limit: usize) -> StoreResult<Vec<Article>> {
        let articles = self.articles.read().await;
        let mut pending: Vec<Article> = articles
            .values()
            .filter(|a| !a.has_summary())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.first_seen.cmp(&b.first_seen));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn sources(&self) -> StoreResult<Vec<String>> {
        let articles = self.articles.read().await;
        let names: BTreeSet<String> = articles.values().map(|a| a.source.clone()).collect();
        Ok(names.into_iter().collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.articles.read().await.len())
    }
}
