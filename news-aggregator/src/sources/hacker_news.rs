use crate::fetcher::Fetcher;
use crate::parser::{html_to_text, MAX_BODY_CHARS};
use crate::traits::SourceAdapter;
use crate::types::{AdapterOutput, Candidate, FetchError, SoftParseError, Source};
use crate::utils::text::truncate_chars;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_MAX_ITEMS: usize = 15;

const ITEM_PAGE: &str = "https://news.ycombinator.com/item?id=";

/// One item from the Firebase item endpoint. Every field is optional because
/// deleted and dead items come back nearly empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub score: Option<i64>,
    pub descendants: Option<i64>,
    /// Self-post text, HTML.
    pub text: Option<String>,
    /// Unix seconds.
    pub time: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

/// Hacker News top stories via the public JSON API. A source with a
/// non-empty url uses it as the API base.
pub struct HackerNewsAdapter {
    fetcher: Arc<Fetcher>,
    api_base: String,
}

impl HackerNewsAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self::with_api_base(fetcher, DEFAULT_API_BASE)
    }

    pub fn with_api_base(fetcher: Arc<Fetcher>, api_base: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn base_for<'a>(&'a self, source: &'a Source) -> &'a str {
        match source.url.trim() {
            "" => &self.api_base,
            url => url.trim_end_matches('/'),
        }
    }

    async fn fetch_item(&self, base: &str, id: u64) -> Result<Option<HnItem>, FetchError> {
        let url = format!("{}/item/{}.json", base, id);
        self.fetcher.fetch_json::<Option<HnItem>>(&url).await
    }
}

/// Map a story to a candidate. `Ok(None)` for items that are not live stories
/// (jobs, polls, deleted posts); `Err` for stories missing their title.
pub fn item_to_candidate(
    source: &str,
    item: &HnItem,
    fetched_at: DateTime<Utc>,
) -> Result<Option<Candidate>, String> {
    if item.deleted || item.dead || item.kind.as_deref() != Some("story") {
        return Ok(None);
    }

    let title = match item.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => return Err(format!("story {} has no title", item.id)),
    };

    let link = item
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}{}", ITEM_PAGE, item.id));

    let mut body = format!(
        "Title: {}. Points: {}. Comments: {}.",
        title,
        item.score.unwrap_or(0),
        item.descendants.unwrap_or(0)
    );
    if let Some(text) = item.text.as_deref().map(html_to_text).filter(|t| !t.is_empty()) {
        body.push(' ');
        body.push_str(&text);
    }

    let published_at = item
        .time
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .unwrap_or(fetched_at);

    Ok(Some(Candidate {
        source: source.to_string(),
        title,
        body: truncate_chars(&body, MAX_BODY_CHARS),
        link: Some(link),
        published_at,
    }))
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    fn adapter_name(&self) -> &'static str {
        "hackernews"
    }

    async fn fetch(&self, source: &Source) -> Result<AdapterOutput, FetchError> {
        info!("Pulling top stories for {}", source.name);

        let base = self.base_for(source);
        let top_url = format!("{}/topstories.json", base);
        let ids: Vec<u64> = self.fetcher.fetch_json(&top_url).await?;
        let max_items = source.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        let ids: Vec<u64> = ids.into_iter().take(max_items).collect();

        let items = join_all(ids.iter().map(|id| self.fetch_item(base, *id))).await;
        let fetched_at = Utc::now();

        let mut output = AdapterOutput::default();
        for (index, (id, item)) in ids.iter().zip(items).enumerate() {
            let item = match item {
                Ok(Some(item)) => item,
                Ok(None) => {
                    debug!("Item {} no longer exists", id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to fetch item {} for {}: {}", id, source.name, e);
                    output.soft_failures.push(SoftParseError {
                        index,
                        reason: format!("item {}: {}", id, e),
                    });
                    continue;
                }
            };

            match item_to_candidate(&source.name, &item, fetched_at) {
                Ok(Some(candidate)) => output.candidates.push(candidate),
                Ok(None) => debug!("Skipping non-story item {}", id),
                Err(reason) => output.soft_failures.push(SoftParseError { index, reason }),
            }
        }

        info!(
            "Pulled {} stories from {} ({} skipped)",
            output.candidates.len(),
            source.name,
            output.soft_failures.len()
        );
        Ok(output)
    }
}
