use news_aggregator::config::{AppConfig, DEFAULT_DATABASE_URL};
use news_aggregator::llm_adapter::SummaryStyle;
use news_aggregator::types::{AggregatorError, SourceKind};
use std::io::Write;

const SAMPLE: &str = r#"
scrape_interval_minutes: 30
retention_days: 14
llm:
  host: localhost
  port: 11434
  model: llama3.2
  summary_style: bullets
sources:
  - name: Ars Technica
    url: https://feeds.arstechnica.com/arstechnica/index
    type: rss
  - name: Hacker News
    url: https://hacker-news.firebaseio.com/v0
    type: hackernews
    max_items: 5
  - name: The Verge
    url: https://www.theverge.com/rss/index.xml
    type: feed
    enabled: "false"
"#;

#[test]
fn parses_sources_and_settings() {
    let config = AppConfig::from_yaml(SAMPLE).unwrap();

    assert_eq!(config.scrape_interval_minutes, 30);
    assert_eq!(config.retention_days, 14);
    assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(config.sources.len(), 3);
    assert_eq!(config.sources[1].kind, SourceKind::Hackernews);
    assert_eq!(config.sources[1].max_items, Some(5));
    assert_eq!(config.sources[2].kind, SourceKind::Rss);
    assert!(!config.sources[2].enabled);

    let enabled: Vec<&str> = config.enabled_sources().map(|s| s.name.as_str()).collect();
    assert_eq!(enabled, vec!["Ars Technica", "Hacker News"]);

    let llm = config.llm.unwrap();
    assert_eq!(llm.summary_style, SummaryStyle::Bullets);
    assert_eq!(llm.max_attempts, 2);
    assert_eq!(llm.base_url(), "http://localhost:11434");
}

#[test]
fn defaults_apply_to_a_minimal_file() {
    let config = AppConfig::from_yaml("sources: []").unwrap();
    assert_eq!(config.scrape_interval_minutes, 60);
    assert_eq!(config.retention_days, 7);
    assert_eq!(config.fetch.max_concurrent_fetches, 5);
    assert_eq!(config.dedup.similarity_threshold, Some(0.85));
    assert!(config.llm.is_none());
    assert_eq!(config.category_rules().len(), 6);
}

#[test]
fn interval_alias_and_unknown_style_are_accepted() {
    let config = AppConfig::from_yaml(
        r#"
cycle_interval_minutes: 15
llm: { host: h, port: 1, model: m, summary_style: haiku }
"#,
    )
    .unwrap();
    assert_eq!(config.scrape_interval_minutes, 15);
    assert_eq!(config.llm.unwrap().summary_style, SummaryStyle::Standard);
}

#[test]
fn duplicate_source_names_are_rejected() {
    let err = AppConfig::from_yaml(
        r#"
sources:
  - { name: A, url: "https://a.example.com/rss", type: rss }
  - { name: A, url: "https://b.example.com/rss", type: rss }
"#,
    )
    .unwrap_err();
    assert!(matches!(err, AggregatorError::Config(ref m) if m.contains("duplicate")));
}

#[test]
fn invalid_urls_and_limits_are_rejected() {
    let bad_url = AppConfig::from_yaml(
        r#"
sources:
  - { name: A, url: "ftp://a.example.com/rss", type: rss }
"#,
    );
    assert!(matches!(bad_url, Err(AggregatorError::Config(_))));

    let too_many = AppConfig::from_yaml("fetch: { max_concurrent_fetches: 50 }");
    assert!(matches!(too_many, Err(AggregatorError::Config(_))));

    let zero_interval = AppConfig::from_yaml("scrape_interval_minutes: 0");
    assert!(matches!(zero_interval, Err(AggregatorError::Config(_))));

    let bad_flag = AppConfig::from_yaml(
        r#"
sources:
  - { name: A, url: "https://a.example.com/rss", type: rss, enabled: "maybe" }
"#,
    );
    assert!(matches!(bad_flag, Err(AggregatorError::Yaml(_))));
}

#[test]
fn api_sources_may_omit_the_url() {
    let config = AppConfig::from_yaml(
        r#"
sources:
  - { name: HN, type: api }
"#,
    )
    .unwrap();
    assert_eq!(config.sources[0].kind, SourceKind::Hackernews);
    assert!(config.sources[0].url.is_empty());
}

#[test]
fn load_reads_from_disk() {
    let path = std::env::temp_dir().join(format!("news-aggregator-config-{}.yaml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.sources.len(), 3);

    std::fs::remove_file(&path).unwrap();
    assert!(matches!(AppConfig::load(&path), Err(AggregatorError::Io(_))));
}
