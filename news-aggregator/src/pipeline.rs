use crate::categorizer::Categorizer;
use crate::config::{AppConfig, DedupConfig};
use crate::dedup::{CycleSeen, Deduplicator, Verdict};
use crate::fetcher::Fetcher;
use crate::llm_adapter::{OllamaSummarizer, Summarizer, SummaryStyle};
use crate::scheduler::{AdapterRegistry, FetchScheduler};
use crate::state::{CycleStage, PipelineStatus};
use crate::store::ArticleStore;
use crate::types::{AggregatorError, Article, CycleReport, FetchConfig, Result, Source, StoreError};
use crate::utils::time::days_before;
use chrono::Utc;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore, TryAcquireError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Knobs that shape a cycle but not its collaborators.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub interval: Duration,
    pub retention_days: u32,
    pub summary_style: SummaryStyle,
    pub pause_between_summaries: Duration,
    pub backlog_limit: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            retention_days: 7,
            summary_style: SummaryStyle::Standard,
            pause_between_summaries: Duration::from_secs(2),
            backlog_limit: 10,
        }
    }
}

/// Drives cycles: fetch, deduplicate, categorize and store, summarize, prune.
///
/// At most one cycle runs at a time. A second `run_cycle` call while one is in
/// flight returns [`AggregatorError::CycleInProgress`] immediately.
pub struct CycleCoordinator {
    store: Arc<dyn ArticleStore>,
    scheduler: FetchScheduler,
    dedup: Deduplicator,
    categorizer: Categorizer,
    summarizer: Option<Arc<dyn Summarizer>>,
    sources: RwLock<Vec<Source>>,
    config_path: Option<PathBuf>,
    settings: CycleSettings,
    status: Arc<PipelineStatus>,
    guard: Semaphore,
}

impl CycleCoordinator {
    pub fn builder(store: Arc<dyn ArticleStore>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(store)
    }

    /// Wire a coordinator from a loaded configuration. With `config_path` set,
    /// the source list is re-read from that file before each cycle.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ArticleStore>,
        config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut builder = Self::builder(store)
            .with_fetch_config(config.fetch.clone())
            .with_dedup_config(config.dedup.clone())
            .with_categorizer(Categorizer::new(config.category_rules()))
            .with_sources(config.sources.clone())
            .with_interval(Duration::from_secs(config.scrape_interval_minutes * 60))
            .with_retention_days(config.retention_days);

        if let Some(path) = config_path {
            builder = builder.with_config_path(path);
        }

        if let Some(llm) = &config.llm {
            info!(
                "Summaries enabled via {} ({}, style {})",
                llm.base_url(),
                llm.model,
                llm.summary_style
            );
            builder = builder
                .with_summarizer(Arc::new(OllamaSummarizer::new(llm.clone())?))
                .with_summary_style(llm.summary_style)
                .with_pause_between(Duration::from_millis(llm.pause_between_ms))
                .with_backlog_limit(llm.backlog_limit);
        } else {
            info!("No llm configured, running without summaries");
        }

        builder.build()
    }

    pub fn status(&self) -> Arc<PipelineStatus> {
        self.status.clone()
    }

    pub async fn sources(&self) -> Vec<Source> {
        self.sources.read().await.clone()
    }

    /// Replace the source list. Takes effect from the next cycle.
    pub async fn set_sources(&self, sources: Vec<Source>) {
        *self.sources.write().await = sources;
    }

    /// Re-read sources from the config file. A broken file keeps the current
    /// list.
    pub async fn reload_sources(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        match AppConfig::load(path) {
            Ok(config) => {
                debug!("Reloaded {} sources from {}", config.sources.len(), path.display());
                self.set_sources(config.sources).await;
            }
            Err(e) => warn!(
                "Failed to reload {}, keeping previous sources: {}",
                path.display(),
                e
            ),
        }
    }

    /// Run one full cycle under the single-flight guard.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _permit = self.guard.try_acquire().map_err(|e| match e {
            TryAcquireError::NoPermits => AggregatorError::CycleInProgress,
            TryAcquireError::Closed => AggregatorError::GuardClosed,
        })?;

        let report = self.execute_cycle().await;
        self.status.cycle_finished(&report).await;
        log_report(&report);
        Ok(report)
    }

    /// Eager first cycle, then one per interval until `shutdown` resolves.
    /// Missed ticks are skipped, so a slow cycle never queues up a burst.
    pub async fn run_forever<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Starting cycle loop every {}",
            crate::utils::time::format_duration(
                chrono::Duration::from_std(self.settings.interval)
                    .unwrap_or_else(|_| chrono::Duration::zero())
            )
        );

        let mut first = true;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping cycle loop");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if !first {
                        self.reload_sources().await;
                    }
                    first = false;

                    match self.run_cycle().await {
                        Ok(_) => {}
                        Err(AggregatorError::CycleInProgress) => {
                            warn!("Previous cycle still running, skipping this tick");
                        }
                        Err(e @ AggregatorError::GuardClosed) => {
                            error!("Cycle guard unavailable: {}", e);
                            return Err(e);
                        }
                        Err(e) => error!("Cycle failed: {}", e),
                    }
                }
            }
        }
    }

    async fn execute_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        self.status.cycle_started(started_at).await;
        let mut report = CycleReport::new(started_at);

        let sources: Vec<Source> = self
            .sources
            .read()
            .await
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        info!("Starting cycle with {} enabled sources", sources.len());

        self.status.set_stage(CycleStage::Fetching).await;
        let round = self.scheduler.run_cycle(&sources).await;
        report.sources = round.reports;

        self.status.set_stage(CycleStage::Deduplicating).await;
        let accepted = self.deduplicate(round.batches, &mut report).await;

        self.status.set_stage(CycleStage::Categorizing).await;
        let stored = self.categorize_and_store(accepted, &mut report).await;

        self.status.set_stage(CycleStage::Summarizing).await;
        self.summarize(&stored, &mut report).await;

        self.status.set_stage(CycleStage::Pruning).await;
        self.prune(&mut report).await;

        report.finished_at = Some(Utc::now());
        report
    }

    async fn deduplicate(
        &self,
        batches: Vec<crate::scheduler::SourceBatch>,
        report: &mut CycleReport,
    ) -> Vec<(String, Article)> {
        let mut seen = match self.dedup.begin_cycle(self.store.as_ref(), Utc::now()).await {
            Ok(seen) => seen,
            Err(e) => {
                warn!("Could not load recent articles for similarity checks: {}", e);
                report.errors.push(format!("similarity preload: {}", e));
                CycleSeen::default()
            }
        };

        let mut accepted = Vec::new();
        for batch in batches {
            for candidate in batch.output.candidates {
                let verdict = self.dedup.check(self.store.as_ref(), &mut seen, &candidate).await;
                let source_report = report.source_entry(&batch.source);
                match verdict {
                    Ok(Verdict::Accept { fingerprint }) => {
                        let article = Article::from_candidate(candidate, fingerprint, Utc::now());
                        accepted.push((batch.source.clone(), article));
                    }
                    Ok(Verdict::Duplicate(reason)) => {
                        debug!("Duplicate from {} ({:?}): {}", batch.source, reason, candidate.title);
                        source_report.duplicates += 1;
                    }
                    Err(e) => {
                        warn!("Dedup lookup failed for '{}': {}", candidate.title, e);
                        source_report.store_errors += 1;
                        source_report.errors.push(e.to_string());
                    }
                }
            }
        }
        debug!("{} candidates passed deduplication", seen.accepted());
        accepted
    }

    /// Articles are counted against the batch they arrived in, whatever source
    /// name the adapter put on them.
    async fn categorize_and_store(
        &self,
        accepted: Vec<(String, Article)>,
        report: &mut CycleReport,
    ) -> Vec<Article> {
        let mut stored = Vec::with_capacity(accepted.len());
        for (batch_source, mut article) in accepted {
            article.category = Some(self.categorizer.categorize_for_source(
                &batch_source,
                &article.title,
                &article.body,
            ));

            let result = self.store.insert(&article).await;
            let source_report = report.source_entry(&batch_source);
            match result {
                Ok(()) => {
                    source_report.new_articles += 1;
                    stored.push(article);
                }
                Err(StoreError::DuplicateKey(fp)) => {
                    debug!("Store already had {}", fp);
                    source_report.duplicates += 1;
                }
                Err(e) => {
                    warn!("Failed to store '{}': {}", article.title, e);
                    source_report.store_errors += 1;
                    source_report.errors.push(e.to_string());
                }
            }
        }
        stored
    }

    async fn summarize(&self, stored: &[Article], report: &mut CycleReport) {
        let Some(summarizer) = &self.summarizer else {
            return;
        };

        if !summarizer.is_available().await {
            info!("{} not available, skipping summaries this cycle", summarizer.adapter_name());
            report.summaries_unavailable += stored.len();
            return;
        }

        let mut queue: Vec<Article> = stored.to_vec();
        if self.settings.backlog_limit > 0 {
            let fresh: HashSet<&str> = stored.iter().map(|a| a.fingerprint.as_str()).collect();
            match self
                .store
                .unsummarized(self.settings.backlog_limit + stored.len())
                .await
            {
                Ok(pending) => {
                    let backlog: Vec<Article> = pending
                        .into_iter()
                        .filter(|a| !fresh.contains(a.fingerprint.as_str()))
                        .take(self.settings.backlog_limit)
                        .collect();
                    if !backlog.is_empty() {
                        info!("Retrying summaries for {} earlier articles", backlog.len());
                    }
                    queue.extend(backlog);
                }
                Err(e) => {
                    warn!("Could not load summary backlog: {}", e);
                    report.errors.push(format!("summary backlog: {}", e));
                }
            }
        }

        for (i, article) in queue.iter().enumerate() {
            if i > 0 && !self.settings.pause_between_summaries.is_zero() {
                tokio::time::sleep(self.settings.pause_between_summaries).await;
            }
            match summarizer.summarize(article, self.settings.summary_style).await {
                Ok(summary) => {
                    match self
                        .store
                        .attach_summary(&article.fingerprint, &summary, Utc::now())
                        .await
                    {
                        Ok(()) => report.summarized += 1,
                        Err(e) => {
                            warn!("Failed to save summary for '{}': {}", article.title, e);
                            report.errors.push(e.to_string());
                        }
                    }
                }
                Err(unavailable) => {
                    debug!("No summary for '{}': {}", article.title, unavailable);
                    report.summaries_unavailable += 1;
                }
            }
        }
    }

    async fn prune(&self, report: &mut CycleReport) {
        let cutoff = days_before(Utc::now(), self.settings.retention_days);
        match self.store.delete_older_than(cutoff).await {
            Ok(removed) => {
                if removed > 0 {
                    info!("Cleaned up {} old articles", removed);
                }
                report.pruned = removed;
            }
            Err(e) => {
                error!("Retention pruning failed: {}", e);
                report.errors.push(format!("pruning: {}", e));
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    let failed = report.failed_sources();
    info!(
        "Cycle finished: {} fetched, {} new, {} duplicates, {} soft failures, {} store errors, {} summarized, {} pruned, {} failed sources",
        report.fetched(),
        report.new_articles(),
        report.duplicates(),
        report.soft_failures(),
        report.store_errors(),
        report.summarized,
        report.pruned,
        failed.len()
    );
    for source in failed {
        warn!("Source {} failed: {}", source.source, source.errors.join("; "));
    }
}

/// Assembles a [`CycleCoordinator`]. Everything except the store has a default.
pub struct CoordinatorBuilder {
    store: Arc<dyn ArticleStore>,
    registry: Option<AdapterRegistry>,
    fetch: FetchConfig,
    dedup: DedupConfig,
    categorizer: Categorizer,
    summarizer: Option<Arc<dyn Summarizer>>,
    sources: Vec<Source>,
    config_path: Option<PathBuf>,
    settings: CycleSettings,
    status: Option<Arc<PipelineStatus>>,
}

impl CoordinatorBuilder {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            registry: None,
            fetch: FetchConfig::default(),
            dedup: DedupConfig::default(),
            categorizer: Categorizer::default(),
            summarizer: None,
            sources: Vec::new(),
            config_path: None,
            settings: CycleSettings::default(),
            status: None,
        }
    }

    /// Use these adapters instead of the HTTP-backed defaults.
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_dedup_config(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.settings.interval = interval;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.settings.retention_days = days;
        self
    }

    pub fn with_summary_style(mut self, style: SummaryStyle) -> Self {
        self.settings.summary_style = style;
        self
    }

    pub fn with_pause_between(mut self, pause: Duration) -> Self {
        self.settings.pause_between_summaries = pause;
        self
    }

    pub fn with_backlog_limit(mut self, limit: usize) -> Self {
        self.settings.backlog_limit = limit;
        self
    }

    pub fn with_status(mut self, status: Arc<PipelineStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> Result<CycleCoordinator> {
        if self.settings.interval.is_zero() {
            return Err(AggregatorError::Config(
                "cycle interval must be greater than zero".to_string(),
            ));
        }

        let registry = match self.registry {
            Some(registry) => registry,
            None => AdapterRegistry::with_defaults(Arc::new(Fetcher::new(self.fetch.clone())?)),
        };

        Ok(CycleCoordinator {
            store: self.store,
            scheduler: FetchScheduler::from_config(registry, &self.fetch),
            dedup: Deduplicator::new(self.dedup),
            categorizer: self.categorizer,
            summarizer: self.summarizer,
            sources: RwLock::new(self.sources),
            config_path: self.config_path,
            settings: self.settings,
            status: self.status.unwrap_or_default(),
            guard: Semaphore::new(1),
        })
    }
}
