use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::traits::SourceAdapter;
use crate::types::{AdapterOutput, Candidate, FetchError, Source};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Entries taken from a feed per cycle unless the source overrides it.
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// Feed bodies shorter than this are replaced by the linked page's text when
/// the source asks for full-text enrichment.
const SHORT_BODY_CHARS: usize = 500;
const PAGE_FETCH_CONCURRENCY: usize = 3;

/// RSS 2.0 / Atom adapter.
pub struct FeedAdapter {
    fetcher: Arc<Fetcher>,
    /// Time from the start of a fetch after which no more pages are awaited.
    /// Kept below the per-source timeout so the parsed entries always make it out.
    enrich_budget: Duration,
}

impl FeedAdapter {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        let source_timeout = Duration::from_secs(fetcher.config().source_timeout_seconds);
        Self {
            fetcher,
            enrich_budget: source_timeout.mul_f64(0.75),
        }
    }

    /// Swap short excerpts for the article page text. A page that fails to
    /// load, or is still loading at `deadline`, leaves the feed excerpt in place.
    async fn enrich(
        &self,
        source: &Source,
        candidates: Vec<Candidate>,
        deadline: Instant,
    ) -> Vec<Candidate> {
        let fetcher = &self.fetcher;
        stream::iter(candidates)
            .map(|mut candidate| async move {
                let link = match candidate.link.clone() {
                    Some(link) if candidate.body.chars().count() < SHORT_BODY_CHARS => link,
                    _ => return candidate,
                };
                match tokio::time::timeout_at(deadline, fetcher.fetch_page_text(&link)).await {
                    Ok(Ok(Some(text))) if text.chars().count() > candidate.body.chars().count() => {
                        candidate.body = text
                    }
                    Ok(Ok(Some(_))) => {
                        debug!("Page text at {} is no longer than the feed body", link)
                    }
                    Ok(Ok(None)) => debug!("No readable text at {}", link),
                    Ok(Err(e)) => {
                        warn!("Full-text fetch failed for {} ({}): {}", link, source.name, e)
                    }
                    Err(_) => warn!("Full-text budget spent for {}, keeping excerpt of {}", source.name, link),
                }
                candidate
            })
            .buffered(PAGE_FETCH_CONCURRENCY)
            .collect()
            .await
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn adapter_name(&self) -> &'static str {
        "rss"
    }

    async fn fetch(&self, source: &Source) -> Result<AdapterOutput, FetchError> {
        info!("Pulling feed {}: {}", source.name, source.url);
        let deadline = Instant::now() + self.enrich_budget;

        let content = self.fetcher.fetch_text(&source.url).await?;
        let max_items = source.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        let mut output = FeedParser::parse_feed(&source.name, &content, max_items, Utc::now())?;

        if source.full_text {
            let candidates = std::mem::take(&mut output.candidates);
            output.candidates = self.enrich(source, candidates, deadline).await;
        }

        info!(
            "Pulled {} items from feed {}",
            output.candidates.len(),
            source.name
        );
        Ok(output)
    }
}
