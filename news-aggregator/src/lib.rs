pub mod api;
pub mod categorizer;
pub mod config;
pub mod dedup;
pub mod fetcher;
pub mod llm_adapter;
pub mod parser;
pub mod pipeline;
pub mod scheduler;
pub mod sources;
pub mod state;
pub mod store;
pub mod traits;
pub mod types;
pub mod utils;

pub use categorizer::{CategoryRule, Categorizer};
pub use config::AppConfig;
pub use dedup::Deduplicator;
pub use fetcher::Fetcher;
pub use llm_adapter::{OllamaSummarizer, Summarizer, SummaryStyle};
pub use parser::FeedParser;
pub use pipeline::{CoordinatorBuilder, CycleCoordinator};
pub use scheduler::{AdapterRegistry, FetchScheduler};
pub use state::PipelineStatus;
pub use store::{ArticleStore, MemoryStore, SqliteStore};
pub use traits::SourceAdapter;
pub use types::*;
