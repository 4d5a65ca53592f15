use crate::fetcher::Fetcher;
use crate::sources::{FeedAdapter, HackerNewsAdapter};
use crate::traits::SourceAdapter;
use crate::types::{AdapterOutput, FetchConfig, FetchError, Source, SourceKind, SourceReport};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Maps a source type to the adapter that handles it. New source types are
/// added by registering an adapter, not by branching on the type elsewhere.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed and Hacker News adapters sharing one HTTP client.
    pub fn with_defaults(fetcher: Arc<Fetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(SourceKind::Rss, Arc::new(FeedAdapter::new(fetcher.clone())));
        registry.register(SourceKind::Hackernews, Arc::new(HackerNewsAdapter::new(fetcher)));
        registry
    }

    pub fn register(&mut self, kind: SourceKind, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&kind).cloned()
    }
}

/// Everything one source delivered this cycle.
#[derive(Debug)]
pub struct SourceBatch {
    pub source: String,
    pub output: AdapterOutput,
}

/// Result of the fetching stage: a report entry for every dispatched source
/// (in configuration order) and the batches from the ones that succeeded.
#[derive(Debug, Default)]
pub struct FetchRound {
    pub reports: Vec<SourceReport>,
    pub batches: Vec<SourceBatch>,
}

/// Runs one fetch task per source under a global concurrency cap and a
/// per-source timeout. A failing or slow source only affects its own report.
#[derive(Clone)]
pub struct FetchScheduler {
    registry: AdapterRegistry,
    max_concurrent: usize,
    source_timeout: Duration,
}

impl FetchScheduler {
    pub fn new(registry: AdapterRegistry, max_concurrent: usize, source_timeout: Duration) -> Self {
        Self {
            registry,
            max_concurrent: max_concurrent.max(1),
            source_timeout,
        }
    }

    pub fn from_config(registry: AdapterRegistry, config: &FetchConfig) -> Self {
        Self::new(
            registry,
            config.max_concurrent_fetches,
            Duration::from_secs(config.source_timeout_seconds),
        )
    }

    pub async fn run_cycle(&self, sources: &[Source]) -> FetchRound {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut reports: Vec<SourceReport> =
            sources.iter().map(|s| SourceReport::new(&s.name)).collect();
        let mut outputs: Vec<Option<AdapterOutput>> = sources.iter().map(|_| None).collect();

        // Dispatch in configuration order; completion order is whatever it is.
        let mut in_flight = FuturesUnordered::new();
        for (index, source) in sources.iter().enumerate() {
            let Some(adapter) = self.registry.get(source.kind) else {
                warn!("No adapter for {} ({})", source.name, source.kind);
                reports[index].failed = true;
                reports[index]
                    .errors
                    .push(FetchError::NoAdapter(source.kind).to_string());
                continue;
            };

            let source = source.clone();
            let permits = permits.clone();
            let timeout = self.source_timeout;
            let handle = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| FetchError::Aborted(e.to_string()))?;
                debug!("Fetching {} via {}", source.name, adapter.adapter_name());
                match tokio::time::timeout(timeout, adapter.fetch(&source)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        seconds: timeout.as_secs(),
                    }),
                }
            });
            in_flight.push(async move { (index, handle.await) });
        }

        while let Some((index, joined)) = in_flight.next().await {
            let report = &mut reports[index];
            let result = joined.unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string())));
            match result {
                Ok(output) => {
                    report.fetched = output.candidates.len();
                    report.soft_failures = output.soft_failures.len();
                    outputs[index] = Some(output);
                }
                Err(e) => {
                    warn!("Source {} failed: {}", report.source, e);
                    report.failed = true;
                    report.errors.push(e.to_string());
                }
            }
        }

        let batches: Vec<SourceBatch> = sources
            .iter()
            .zip(outputs)
            .filter_map(|(source, output)| {
                output.map(|output| SourceBatch {
                    source: source.name.clone(),
                    output,
                })
            })
            .collect();

        info!(
            "Fetched {} of {} sources ({} candidates)",
            batches.len(),
            sources.len(),
            batches.iter().map(|b| b.output.candidates.len()).sum::<usize>()
        );

        FetchRound { reports, batches }
    }
}
