use crate::config::DedupConfig;
use crate::store::{ArticleStore, RecentEntry, StoreResult};
use crate::types::Candidate;
use crate::utils::text::{normalize, preview, truncate_chars};
use crate::utils::time::days_before;
use crate::utils::url::canonical_link;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

/// Characters of each text compared by the near-duplicate check.
const SIMILARITY_CHARS: usize = 500;
/// Titles at least this similar get their bodies compared as well.
const CONTENT_CHECK_FLOOR: f64 = 0.5;

/// Stable content fingerprint: SHA-256 over the canonical link (or the
/// normalized title when there is no link) and a normalized body excerpt.
///
/// Case and whitespace differences do not change the result.
pub fn fingerprint(link: Option<&str>, title: &str, body: &str, excerpt_chars: usize) -> String {
    let identity = match link.map(str::trim).filter(|l| !l.is_empty()) {
        Some(link) => canonical_link(link),
        None => normalize(title),
    };
    let excerpt = truncate_chars(&normalize(body), excerpt_chars);

    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(b"\n");
    hasher.update(excerpt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Similarity in `0.0..=1.0` over the lower-cased leading characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let a = truncate_chars(&a.to_lowercase(), SIMILARITY_CHARS);
    let b = truncate_chars(&b.to_lowercase(), SIMILARITY_CHARS);
    strsim::normalized_levenshtein(&a, &b)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateReason {
    /// Fingerprint already stored or already accepted this cycle.
    Fingerprint,
    /// Same canonical link, possibly with different content.
    Link,
    SimilarTitle(f64),
    SimilarContent(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept { fingerprint: String },
    Duplicate(DuplicateReason),
}

/// What this cycle has already accepted. Lives for one cycle only; anything
/// that must outlast it is in the store.
#[derive(Debug, Default)]
pub struct CycleSeen {
    fingerprints: HashSet<String>,
    links: HashSet<String>,
    recent: Vec<RecentEntry>,
}

impl CycleSeen {
    pub fn new(recent: Vec<RecentEntry>) -> Self {
        Self {
            recent,
            ..Default::default()
        }
    }

    pub fn accepted(&self) -> usize {
        self.fingerprints.len()
    }

    fn record(&mut self, fingerprint: &str, candidate: &Candidate) {
        self.fingerprints.insert(fingerprint.to_string());
        if let Some(link) = &candidate.link {
            self.links.insert(canonical_link(link));
        }
        self.recent.push(RecentEntry {
            title: candidate.title.clone(),
            body: candidate.body.clone(),
        });
    }
}

pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn fingerprint(&self, candidate: &Candidate) -> String {
        fingerprint(
            candidate.link.as_deref(),
            &candidate.title,
            &candidate.body,
            self.config.excerpt_chars,
        )
    }

    /// Start a cycle's seen set, preloaded with titles first seen inside the
    /// similarity window when near-duplicate checks are on.
    pub async fn begin_cycle(
        &self,
        store: &dyn ArticleStore,
        now: DateTime<Utc>,
    ) -> StoreResult<CycleSeen> {
        if self.config.similarity_threshold.is_none() {
            return Ok(CycleSeen::default());
        }
        let since = days_before(now, self.config.similarity_window_days);
        let recent = store.recent_since(since).await?;
        debug!("Loaded {} recent articles for similarity checks", recent.len());
        Ok(CycleSeen::new(recent))
    }

    /// Decide whether `candidate` is new. An accepted candidate is recorded in
    /// `seen` before returning, so a second identical candidate in the same
    /// cycle is always rejected.
    pub async fn check(
        &self,
        store: &dyn ArticleStore,
        seen: &mut CycleSeen,
        candidate: &Candidate,
    ) -> StoreResult<Verdict> {
        let fp = self.fingerprint(candidate);

        if seen.fingerprints.contains(&fp) || store.exists(&fp).await? {
            return Ok(Verdict::Duplicate(DuplicateReason::Fingerprint));
        }

        if let Some(link) = &candidate.link {
            if seen.links.contains(&canonical_link(link)) || store.exists_link(link).await? {
                return Ok(Verdict::Duplicate(DuplicateReason::Link));
            }
        }

        if let Some(reason) = self.near_duplicate(seen, candidate) {
            return Ok(Verdict::Duplicate(reason));
        }

        seen.record(&fp, candidate);
        Ok(Verdict::Accept { fingerprint: fp })
    }

    fn near_duplicate(&self, seen: &CycleSeen, candidate: &Candidate) -> Option<DuplicateReason> {
        let threshold = self.config.similarity_threshold?;

        for entry in &seen.recent {
            let title_sim = similarity(&candidate.title, &entry.title);
            if title_sim > threshold {
                debug!(
                    "Duplicate detected (title similarity: {:.2}): {}",
                    title_sim,
                    preview(&candidate.title, 50)
                );
                return Some(DuplicateReason::SimilarTitle(title_sim));
            }

            if title_sim > CONTENT_CHECK_FLOOR {
                let content_sim = similarity(&candidate.body, &entry.body);
                if content_sim > threshold {
                    debug!(
                        "Duplicate detected (content similarity: {:.2}): {}",
                        content_sim,
                        preview(&candidate.title, 50)
                    );
                    return Some(DuplicateReason::SimilarContent(content_sim));
                }
            }
        }
        None
    }
}
