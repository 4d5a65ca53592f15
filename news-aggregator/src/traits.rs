use crate::types::{AdapterOutput, FetchError, Source};
use async_trait::async_trait;

/// Pulls candidates from one kind of source (RSS feeds, JSON APIs, ...).
///
/// Adapters are stateless with respect to a cycle: everything they need comes
/// from the `Source` they are handed, so one instance serves every source of
/// its kind concurrently.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs.
    fn adapter_name(&self) -> &'static str;

    /// Fetch and normalize entries from `source`.
    ///
    /// Returns `Err` only when the source as a whole is unusable. Individual
    /// malformed entries go into `AdapterOutput::soft_failures`.
    async fn fetch(&self, source: &Source) -> Result<AdapterOutput, FetchError>;
}
