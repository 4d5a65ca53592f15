mod common;

use chrono::{DateTime, Duration, Utc};
use common::aged_article;
use news_aggregator::store::ArticleFilter;
use news_aggregator::types::StoreError;
use news_aggregator::{ArticleStore, MemoryStore, SqliteStore};
use std::sync::Arc;

async fn stores() -> Vec<(&'static str, Arc<dyn ArticleStore>)> {
    let sqlite = SqliteStore::in_memory().await.expect("in-memory sqlite");
    vec![
        ("memory", Arc::new(MemoryStore::new()) as Arc<dyn ArticleStore>),
        ("sqlite", Arc::new(sqlite) as Arc<dyn ArticleStore>),
    ]
}

#[tokio::test]
async fn insert_rejects_duplicate_fingerprints() {
    for (name, store) in stores().await {
        let article = aged_article("fp-1", "Wire", "Story", Duration::hours(1));
        store.insert(&article).await.unwrap();

        let err = store.insert(&article).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(ref fp) if fp == "fp-1"), "{}", name);
        assert_eq!(store.count().await.unwrap(), 1, "{}", name);
        assert!(store.exists("fp-1").await.unwrap(), "{}", name);
        assert!(!store.exists("fp-2").await.unwrap(), "{}", name);
    }
}

#[tokio::test]
async fn link_lookup_uses_canonical_form() {
    for (name, store) in stores().await {
        let mut article = aged_article("fp-1", "Wire", "Story", Duration::hours(1));
        article.link = Some("https://Example.com/Story/".to_string());
        store.insert(&article).await.unwrap();

        assert!(store.exists_link("https://example.com/story#top").await.unwrap(), "{}", name);
        assert!(!store.exists_link("https://example.com/other").await.unwrap(), "{}", name);
    }
}

#[tokio::test]
async fn delete_older_than_removes_only_aged_articles() {
    for (name, store) in stores().await {
        store
            .insert(&aged_article("old", "Wire", "Old", Duration::days(10)))
            .await
            .unwrap();
        store
            .insert(&aged_article("new", "Wire", "New", Duration::days(1)))
            .await
            .unwrap();

        let removed = store
            .delete_older_than(Utc::now() - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 1, "{}", name);
        assert!(!store.exists("old").await.unwrap(), "{}", name);
        assert!(store.exists("new").await.unwrap(), "{}", name);
    }
}

#[tokio::test]
async fn earliest_instant_cutoffs_match_everything_and_delete_nothing() {
    for (name, store) in stores().await {
        store
            .insert(&aged_article("old", "Wire", "Old", Duration::days(3650)))
            .await
            .unwrap();

        let earliest = DateTime::<Utc>::MIN_UTC;
        assert_eq!(store.delete_older_than(earliest).await.unwrap(), 0, "{}", name);

        let filter = ArticleFilter {
            since: Some(earliest),
            ..Default::default()
        };
        assert_eq!(store.query(&filter).await.unwrap().len(), 1, "{}", name);
        assert_eq!(store.recent_since(earliest).await.unwrap().len(), 1, "{}", name);
    }
}

#[tokio::test]
async fn query_filters_and_orders_newest_first() {
    for (name, store) in stores().await {
        let mut a = aged_article("a", "Wire", "A", Duration::hours(3));
        a.category = Some("Tech".to_string());
        let mut b = aged_article("b", "Wire", "B", Duration::hours(1));
        b.category = Some("Gaming".to_string());
        let mut c = aged_article("c", "Blog", "C", Duration::hours(2));
        c.category = Some("Tech".to_string());
        let d = aged_article("d", "Wire", "D", Duration::days(9));
        for article in [&a, &b, &c, &d] {
            store.insert(article).await.unwrap();
        }

        let all = store.query(&ArticleFilter::default()).await.unwrap();
        let order: Vec<&str> = all.iter().map(|x| x.fingerprint.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a", "d"], "{}", name);

        let tech = store
            .query(&ArticleFilter {
                category: Some("Tech".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tech.len(), 2, "{}", name);

        let recent_wire = store
            .query(&ArticleFilter {
                source: Some("Wire".to_string()),
                since: Some(Utc::now() - Duration::days(7)),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recent_wire.len(), 1, "{}", name);
        assert_eq!(recent_wire[0].fingerprint, "b", "{}", name);
        assert_eq!(recent_wire[0].category.as_deref(), Some("Gaming"), "{}", name);
    }
}

#[tokio::test]
async fn summaries_attach_and_leave_the_backlog() {
    for (name, store) in stores().await {
        store
            .insert(&aged_article("older", "Wire", "Older", Duration::hours(5)))
            .await
            .unwrap();
        store
            .insert(&aged_article("newer", "Wire", "Newer", Duration::hours(1)))
            .await
            .unwrap();

        let pending = store.unsummarized(10).await.unwrap();
        let order: Vec<&str> = pending.iter().map(|x| x.fingerprint.as_str()).collect();
        assert_eq!(order, vec!["older", "newer"], "{}", name);

        store.attach_summary("older", "A summary.", Utc::now()).await.unwrap();
        let pending = store.unsummarized(10).await.unwrap();
        assert_eq!(pending.len(), 1, "{}", name);

        let stored = store.query(&ArticleFilter::default()).await.unwrap();
        let older = stored.iter().find(|a| a.fingerprint == "older").unwrap();
        assert_eq!(older.ai_summary.as_deref(), Some("A summary."), "{}", name);
        assert!(older.summarized_at.is_some(), "{}", name);

        let missing = store.attach_summary("nope", "x", Utc::now()).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)), "{}", name);
    }
}

#[tokio::test]
async fn sources_and_recent_entries() {
    for (name, store) in stores().await {
        store
            .insert(&aged_article("1", "Wire", "One", Duration::days(1)))
            .await
            .unwrap();
        store
            .insert(&aged_article("2", "Blog", "Two", Duration::days(5)))
            .await
            .unwrap();

        assert_eq!(store.sources().await.unwrap(), vec!["Blog", "Wire"], "{}", name);

        let recent = store.recent_since(Utc::now() - Duration::days(3)).await.unwrap();
        assert_eq!(recent.len(), 1, "{}", name);
        assert_eq!(recent[0].title, "One", "{}", name);
    }
}

#[tokio::test]
async fn sqlite_round_trips_timestamps_to_the_millisecond() {
    let store = SqliteStore::in_memory().await.unwrap();
    let article = aged_article("ts", "Wire", "Timestamp", Duration::minutes(30));
    store.insert(&article).await.unwrap();

    let stored = store.query(&ArticleFilter::default()).await.unwrap();
    assert_eq!(
        stored[0].first_seen.timestamp_millis(),
        article.first_seen.timestamp_millis()
    );
    assert_eq!(stored[0].link, article.link);
    store.ping().await.unwrap();
}
