use crate::types::{AdapterOutput, Candidate, FetchError, SoftParseError};
use crate::utils::text::{collapse_whitespace, truncate_chars};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use scraper::{Html, Selector};
use tracing::{debug, info};

/// Body text is capped at this many characters.
pub const MAX_BODY_CHARS: usize = 5000;

const MAX_PARAGRAPHS: usize = 30;
const MIN_PAGE_TEXT_CHARS: usize = 200;

pub struct FeedParser;

impl FeedParser {
    /// Parse an RSS/Atom document into candidates for `source`.
    ///
    /// The whole call fails only when the envelope itself is unreadable. Entries
    /// that cannot be turned into a candidate are skipped and reported as soft
    /// failures. At most `max_items` entries are considered, in feed order.
    pub fn parse_feed(
        source: &str,
        content: &str,
        max_items: usize,
        fetched_at: DateTime<Utc>,
    ) -> Result<AdapterOutput, FetchError> {
        debug!("Parsing feed content for {} ({} bytes)", source, content.len());

        if !Self::is_valid_feed_content(content) {
            return Err(FetchError::Malformed(format!(
                "{} did not return an RSS or Atom document",
                source
            )));
        }

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| FetchError::Parse(format!("Failed to parse feed: {}", e)))?;

        let mut output = AdapterOutput::default();
        for (index, entry) in feed.entries.into_iter().take(max_items).enumerate() {
            match Self::parse_entry(source, entry, fetched_at) {
                Ok(candidate) => output.candidates.push(candidate),
                Err(reason) => {
                    debug!("Skipping entry {} from {}: {}", index, source, reason);
                    output.soft_failures.push(SoftParseError { index, reason });
                }
            }
        }

        info!(
            "Parsed feed {} with {} entries ({} skipped)",
            source,
            output.candidates.len(),
            output.soft_failures.len()
        );
        Ok(output)
    }

    fn parse_entry(
        source: &str,
        entry: feed_rs::model::Entry,
        fetched_at: DateTime<Utc>,
    ) -> Result<Candidate, String> {
        let title = entry
            .title
            .map(|t| collapse_whitespace(&html_to_text(&t.content)))
            .filter(|t| !t.is_empty());

        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|l| !l.is_empty());

        // Full embedded content wins over the feed-provided summary.
        let raw_body = entry
            .content
            .and_then(|c| c.body)
            .filter(|b| !b.trim().is_empty())
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();
        let body = truncate_chars(&html_to_text(&raw_body), MAX_BODY_CHARS);

        let title = match (title, &link) {
            (Some(title), _) => title,
            (None, Some(_)) => "No title".to_string(),
            (None, None) => return Err("entry has neither title nor link".to_string()),
        };

        if link.is_none() && body.is_empty() {
            return Err(format!("entry '{}' has no link and no content", title));
        }

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fetched_at);

        Ok(Candidate {
            source: source.to_string(),
            title,
            body,
            link,
            published_at,
        })
    }

    /// Cheap check that content looks like an RSS/Atom document before handing
    /// it to the real parser.
    pub fn is_valid_feed_content(content: &str) -> bool {
        let head: String = content.chars().take(2048).collect::<String>().to_lowercase();

        head.contains("<rss")
            || head.contains("<feed")
            || head.contains("<rdf")
            || head.contains("<channel")
    }
}

/// Strip markup and collapse whitespace.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }
    let html = Html::parse_fragment(fragment);
    let text: Vec<&str> = html.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

/// Readable article text from a full HTML page: the first paragraphs outside
/// navigation and boilerplate. `None` when the page carries too little prose.
pub fn extract_article_text(page: &str) -> Option<String> {
    let html = Html::parse_document(page);
    let paragraphs = Selector::parse("p").ok()?;
    let boilerplate = ["script", "style", "nav", "header", "footer", "aside"];

    let text = html
        .select(&paragraphs)
        .filter(|p| {
            !p.ancestors()
                .filter_map(scraper::ElementRef::wrap)
                .any(|a| boilerplate.contains(&a.value().name()))
        })
        .take(MAX_PARAGRAPHS)
        .map(|p| collapse_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.chars().count() > MIN_PAGE_TEXT_CHARS {
        Some(truncate_chars(&text, MAX_BODY_CHARS))
    } else {
        None
    }
}
