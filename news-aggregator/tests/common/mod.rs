// Shared fixtures for the integration tests: scripted source adapters,
// scripted summarizers and a few feed documents. Nothing here touches the
// network.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::{any, MethodRouter};
use chrono::{DateTime, Duration, Utc};
use news_aggregator::llm_adapter::{Summarizer, SummaryStyle};
use news_aggregator::scheduler::AdapterRegistry;
use news_aggregator::traits::SourceAdapter;
use news_aggregator::types::{
    AdapterOutput, Article, Candidate, FetchError, Source, SourceKind, SummaryUnavailable,
};
use news_aggregator::{ArticleStore, CoordinatorBuilder, CycleCoordinator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

pub fn candidate(source: &str, title: &str, body: &str, link: Option<&str>) -> Candidate {
    Candidate {
        source: source.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        link: link.map(str::to_string),
        published_at: Utc::now(),
    }
}

/// A stored article first seen `age` ago.
pub fn aged_article(fingerprint: &str, source: &str, title: &str, age: Duration) -> Article {
    let first_seen = Utc::now() - age;
    Article {
        fingerprint: fingerprint.to_string(),
        source: source.to_string(),
        title: title.to_string(),
        body: format!("Body of {}", title),
        link: Some(format!("https://example.com/{}", fingerprint)),
        published_at: first_seen,
        category: Some("uncategorized".to_string()),
        ai_summary: None,
        summarized_at: None,
        first_seen,
    }
}

pub fn rss_source(name: &str) -> Source {
    Source::new(name, format!("https://{}.example.com/feed", name), SourceKind::Rss)
}

pub fn api_source(name: &str) -> Source {
    Source::new(name, "", SourceKind::Hackernews)
}

enum Script {
    Items(Vec<Candidate>),
    Fail(String),
    Hang(std::time::Duration),
}

/// Adapter whose per-source behaviour is fixed up front. Sources without a
/// script return an empty batch.
#[derive(Default, Clone)]
pub struct ScriptedAdapter {
    scripts: Arc<Mutex<HashMap<String, Arc<Script>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(self, source: &str, items: Vec<Candidate>) -> Self {
        self.set(source, Script::Items(items));
        self
    }

    pub fn failing(self, source: &str, reason: &str) -> Self {
        self.set(source, Script::Fail(reason.to_string()));
        self
    }

    /// Sleeps for `duration` before answering, to trip the per-source timeout.
    pub fn hanging(self, source: &str, duration: std::time::Duration) -> Self {
        self.set(source, Script::Hang(duration));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, source: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(source.to_string(), Arc::new(script));
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn adapter_name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, source: &Source) -> Result<AdapterOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().get(&source.name).cloned();

        match script.as_deref() {
            Some(Script::Items(items)) => Ok(AdapterOutput {
                candidates: items.clone(),
                soft_failures: Vec::new(),
            }),
            Some(Script::Fail(reason)) => Err(FetchError::Malformed(reason.clone())),
            Some(Script::Hang(duration)) => {
                tokio::time::sleep(*duration).await;
                Ok(AdapterOutput::default())
            }
            None => Ok(AdapterOutput::default()),
        }
    }
}

pub fn registry_with(adapter: ScriptedAdapter) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let adapter: Arc<dyn SourceAdapter> = Arc::new(adapter);
    registry.register(SourceKind::Rss, adapter.clone());
    registry.register(SourceKind::Hackernews, adapter);
    registry
}

/// Coordinator over `store` with scripted adapters and no pauses.
pub fn coordinator_builder(
    store: Arc<dyn ArticleStore>,
    adapter: ScriptedAdapter,
    sources: Vec<Source>,
) -> CoordinatorBuilder {
    CycleCoordinator::builder(store)
        .with_registry(registry_with(adapter))
        .with_sources(sources)
        .with_pause_between(std::time::Duration::ZERO)
}

/// Summarizer that answers with a fixed text, or refuses every request.
pub struct ScriptedSummarizer {
    available: bool,
    succeed: bool,
    pub calls: AtomicUsize,
}

impl ScriptedSummarizer {
    pub fn working() -> Self {
        Self {
            available: true,
            succeed: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reachable, but every call fails.
    pub fn failing() -> Self {
        Self {
            available: true,
            succeed: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        Self {
            available: false,
            succeed: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    fn adapter_name(&self) -> String {
        "scripted".to_string()
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn summarize(
        &self,
        article: &Article,
        style: SummaryStyle,
    ) -> Result<String, SummaryUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(format!("[{}] {}", style, article.title))
        } else {
            Err(SummaryUnavailable::new("connection refused"))
        }
    }
}

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    format!("http://{}", addr)
}

/// Handler that answers the first `failures` requests with `status` and every
/// later one with 200 and `body`. `hits` counts requests of either kind.
pub fn flaky(
    status: StatusCode,
    failures: usize,
    body: &'static str,
    hits: Arc<AtomicUsize>,
) -> MethodRouter {
    any(move || {
        let hits = hits.clone();
        async move {
            if hits.fetch_add(1, Ordering::SeqCst) < failures {
                (status, "try again later")
            } else {
                (StatusCode::OK, body)
            }
        }
    })
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <link>https://news.example.com</link>
    <description>Example feed</description>
    <item>
      <title>NASA launches new rocket</title>
      <link>https://news.example.com/nasa-rocket</link>
      <description>&lt;p&gt;The &lt;b&gt;rocket&lt;/b&gt; lifted off at dawn.&lt;/p&gt;</description>
      <pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate>
    </item>
    <item>
      <link>https://news.example.com/untitled</link>
      <description>An entry without a title.</description>
    </item>
    <item>
      <description>Neither title nor link.</description>
    </item>
    <item>
      <title>Chip makers report record demand</title>
      <link>https://news.example.com/chips</link>
      <description>Semiconductor sales rose again.</description>
    </item>
  </channel>
</rss>"#;

pub const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2025-06-10T18:30:02Z</updated>
  <entry>
    <title>Patch Tuesday fixes zero-day</title>
    <link href="https://atom.example.com/patch-tuesday"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2025-06-10T18:30:02Z</updated>
    <summary>Short summary.</summary>
    <content type="html">&lt;p&gt;Full embedded content about the patch.&lt;/p&gt;</content>
  </entry>
</feed>"#;
