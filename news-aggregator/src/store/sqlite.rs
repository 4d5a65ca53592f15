use super::{ArticleFilter, ArticleStore, RecentEntry, StoreResult};
use crate::types::{Article, StoreError};
use crate::utils::url::canonical_link;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const ARTICLE_COLUMNS: &str = "fingerprint, source, title, body, link, published_at, category, \
                               ai_summary, summarized_at, first_seen";

/// SQLite-backed article store. Timestamps are stored as unix milliseconds.
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and make sure
    /// the schema exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let db = pool.connect_with(options).await?;

        let store = Self { db };
        store.setup_schema().await?;
        info!("Opened article store at {}", database_url);
        Ok(store)
    }

    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn setup_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                fingerprint TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                link TEXT,
                link_key TEXT,
                published_at INTEGER NOT NULL,
                category TEXT,
                ai_summary TEXT,
                summarized_at INTEGER,
                first_seen INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_link_key ON articles (link_key)")
            .execute(&self.db)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_first_seen ON articles (first_seen)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Health probe for the web surface.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
}

fn row_to_article(row: &SqliteRow) -> StoreResult<Article> {
    let summarized_at: Option<i64> = row.try_get("summarized_at")?;
    Ok(Article {
        fingerprint: row.try_get("fingerprint")?,
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        link: row.try_get("link")?,
        published_at: from_millis(row.try_get("published_at")?)?,
        category: row.try_get("category")?,
        ai_summary: row.try_get("ai_summary")?,
        summarized_at: summarized_at.map(from_millis).transpose()?,
        first_seen: from_millis(row.try_get("first_seen")?)?,
    })
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn exists(&self, fingerprint: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn exists_link(&self, link: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE link_key = ? LIMIT 1")
            .bind(canonical_link(link))
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, article: &Article) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (fingerprint, source, title, body, link, link_key, published_at,
                                  category, ai_summary, summarized_at, first_seen)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (fingerprint) DO NOTHING
            "#,
        )
        .bind(&article.fingerprint)
        .bind(&article.source)
        .bind(&article.title)
        .bind(&article.body)
        .bind(&article.link)
        .bind(article.link.as_deref().map(canonical_link))
        .bind(to_millis(article.published_at))
        .bind(&article.category)
        .bind(&article.ai_summary)
        .bind(article.summarized_at.map(to_millis))
        .bind(to_millis(article.first_seen))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateKey(article.fingerprint.clone()));
        }
        Ok(())
    }

    async fn attach_summary(
        &self,
        fingerprint: &str,
        summary: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE articles SET ai_summary = ?, summarized_at = ? WHERE fingerprint = ?",
        )
        .bind(summary)
        .bind(to_millis(at))
        .bind(fingerprint)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(fingerprint.to_string()));
        }
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let result = sqlx::query("DELETE FROM articles WHERE first_seen < ?")
            .bind(to_millis(cutoff))
            .execute(&self.db)
            .await?;
        let deleted = result.rows_affected() as usize;
        debug!("Deleted {} articles first seen before {}", deleted, cutoff);
        Ok(deleted)
    }

    async fn query(&self, filter: &ArticleFilter) -> StoreResult<Vec<Article>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM articles WHERE 1 = 1", ARTICLE_COLUMNS));

        if let Some(source) = &filter.source {
            builder.push(" AND source = ").push_bind(source.clone());
        }
        if let Some(category) = &filter.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(since) = filter.since {
            builder.push(" AND first_seen >= ").push_bind(to_millis(since));
        }
        builder.push(" ORDER BY first_seen DESC, fingerprint ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(row_to_article).collect()
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<RecentEntry>> {
        let rows = sqlx::query("SELECT title, body FROM articles WHERE first_seen >= ?")
            .bind(to_millis(since))
            .fetch_all(&self.db)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(RecentEntry {
                title: row.try_get("title")?,
                body: row.try_get("body")?,
            });
        }
        Ok(entries)
    }

    async fn unsummarized(&self, limit: usize) -> StoreResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE ai_summary IS NULL OR TRIM(ai_summary) = '' \
             ORDER BY first_seen ASC LIMIT ?",
            ARTICLE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(row_to_article).collect()
    }

    async fn sources(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT source FROM articles ORDER BY source")
            .fetch_all(&self.db)
            .await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get("source")?);
        }
        Ok(names)
    }

    async fn count(&self) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.db)
            .await?;
        Ok(count as usize)
    }
}
