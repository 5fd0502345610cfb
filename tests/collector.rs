// tests/collector.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use publishing_signal_digest::catalog::{CostTier, SourceCategory, SourceDescriptor, SourceKind};
use publishing_signal_digest::collector::Collector;
use publishing_signal_digest::ingest::fetch::FixtureFetcher;
use publishing_signal_digest::ingest::providers::news_feed::DirectFeedAdapter;
use publishing_signal_digest::ingest::providers::AdapterRegistry;
use publishing_signal_digest::ingest::types::{
    AdapterOutput, RunContext, SourceAdapter, SourceStatus, ThemeQuery,
};
use publishing_signal_digest::social::StaticSocialClient;

fn feed(i: usize) -> SourceDescriptor {
    SourceDescriptor {
        id: format!("src{i}"),
        kind: SourceKind::RssDirect,
        name: format!("Source {i}"),
        category: SourceCategory::IndustryNews,
        cost_tier: CostTier::Free,
        priority: 2,
        item_limit: 5,
        url: Some(format!("https://feeds.example.jp/{i}.xml")),
        fallback_urls: vec![],
        query_template: None,
        max_age_days: None,
    }
}

fn one_item_feed(i: usize) -> String {
    format!(
        r#"<rss><channel><item>
            <title>記事{i}</title>
            <link>https://feeds.example.jp/articles/{i}</link>
        </item></channel></rss>"#
    )
}

fn ctx(fetcher: FixtureFetcher) -> RunContext {
    let now = Utc.with_ymd_and_hms(2026, 2, 20, 3, 0, 0).unwrap();
    RunContext {
        theme: ThemeQuery {
            name: "出版".into(),
            query: String::new(),
            period_days: 2,
        },
        since_date: publishing_signal_digest::ingest::since_date(2, now),
        now,
        timeout: Duration::from_millis(1000),
        max_response_bytes: 2 * 1024 * 1024,
        social: None,
        fetcher: Arc::new(fetcher),
        social_client: Arc::new(StaticSocialClient::ok("{}")),
    }
}

#[tokio::test]
async fn results_follow_catalog_order_not_completion_order() {
    let sources: Vec<_> = (0..5).map(feed).collect();
    let mut fetcher = FixtureFetcher::new();
    for (i, s) in sources.iter().enumerate() {
        let url = s.url.clone().unwrap();
        fetcher = if i == 0 {
            fetcher.with_failure(url, "connection reset")
        } else {
            fetcher.with_page(url, one_item_feed(i))
        };
    }
    let fetcher = fetcher.with_delay("https://feeds.example.jp/2.xml", Duration::from_millis(80));

    let collector = Collector::new(AdapterRegistry::empty().with(SourceKind::RssDirect, DirectFeedAdapter), 3);
    let collection = collector.collect(&sources, &ctx(fetcher)).await;

    let ids: Vec<_> = collection.source_stats.iter().map(|s| s.source_id.as_str()).collect();
    assert_eq!(ids, vec!["src0", "src1", "src2", "src3", "src4"]);

    assert_eq!(collection.source_stats[0].status, SourceStatus::Error);
    assert_eq!(collection.source_stats[0].count, 0);
    assert!(collection.source_stats[0].error.contains("connection reset"));

    let urls: Vec<_> = collection.signals.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://feeds.example.jp/articles/1",
            "https://feeds.example.jp/articles/2",
            "https://feeds.example.jp/articles/3",
            "https://feeds.example.jp/articles/4",
        ]
    );
    assert_eq!(collection.total_signals_before_dedupe(), 4);
}

/// Counts concurrent calls and remembers the peak.
#[derive(Default)]
struct GaugeAdapter {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl SourceAdapter for GaugeAdapter {
    async fn collect(&self, _source: &SourceDescriptor, _ctx: &RunContext) -> Result<AdapterOutput> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(AdapterOutput::Items(vec![]))
    }

    fn name(&self) -> &'static str {
        "gauge"
    }
}

#[tokio::test]
async fn never_more_than_concurrency_in_flight() {
    let gauge = Arc::new(GaugeAdapter::default());
    let registry = AdapterRegistry::empty().with_shared(SourceKind::RssDirect, gauge.clone());
    let sources: Vec<_> = (0..5).map(feed).collect();

    let collection = Collector::new(registry, 2)
        .collect(&sources, &ctx(FixtureFetcher::new()))
        .await;

    assert_eq!(gauge.calls.load(Ordering::SeqCst), 5);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    assert!(collection
        .source_stats
        .iter()
        .all(|s| s.status == SourceStatus::Ok));
}

#[tokio::test]
async fn unknown_kind_is_skipped() {
    let sources = vec![feed(0)];
    let collection = Collector::new(AdapterRegistry::empty(), 4)
        .collect(&sources, &ctx(FixtureFetcher::new()))
        .await;
    assert_eq!(collection.source_stats[0].status, SourceStatus::Skipped);
    assert!(collection.signals.is_empty());
}

struct PanickingAdapter;

#[async_trait]
impl SourceAdapter for PanickingAdapter {
    async fn collect(&self, source: &SourceDescriptor, _ctx: &RunContext) -> Result<AdapterOutput> {
        if source.id == "src1" {
            panic!("layout changed");
        }
        Ok(AdapterOutput::Items(vec![]))
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

#[tokio::test]
async fn panicking_adapter_fails_only_its_source() {
    let sources: Vec<_> = (0..3).map(feed).collect();
    let collection = Collector::new(AdapterRegistry::empty().with(SourceKind::RssDirect, PanickingAdapter), 2)
        .collect(&sources, &ctx(FixtureFetcher::new()))
        .await;

    let statuses: Vec<_> = collection.source_stats.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SourceStatus::Ok, SourceStatus::Error, SourceStatus::Ok]
    );
    assert!(collection.source_stats[1].error.contains("layout changed"));
}
