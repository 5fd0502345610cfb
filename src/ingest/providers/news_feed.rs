// src/ingest/providers/news_feed.rs
//! Feed-backed adapters: news search, direct feeds, feed leaderboards.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};

use crate::catalog::{build_google_news_rss_url, SourceDescriptor};
use crate::ingest::feed::{parse_feed, FeedEntry};
use crate::ingest::fetch::FetchRequest;
use crate::ingest::types::{
    signals_from_drafts, AdapterOutput, MetricLabel, RunContext, SignalDraft, SourceAdapter,
};
use crate::ingest::{fill_template, is_recent_enough, since_date};

/// The search window suffix is clamped to what the news search accepts.
const MAX_WHEN_DAYS: u32 = 30;

async fn fetch_entries(url: &str, ctx: &RunContext) -> Result<Vec<FeedEntry>> {
    let req = FetchRequest::new(ctx.timeout, ctx.max_response_bytes);
    let xml = ctx.fetcher.fetch_text(url, &req).await?;

    let t0 = std::time::Instant::now();
    let entries = parse_feed(&xml).with_context(|| format!("parsing feed {url}"))?;
    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ingest_events_total").increment(entries.len() as u64);
    Ok(entries)
}

fn mention_draft(e: FeedEntry) -> SignalDraft {
    let summary = if e.summary.is_empty() {
        e.title.clone()
    } else {
        e.summary
    };
    SignalDraft {
        title: e.title,
        summary,
        url: e.link,
        published_at: Some(e.published_at).filter(|p| !p.is_empty()),
        metric_label: MetricLabel::Mentions,
        metric_value: 1.0,
        cover_image_url: None,
    }
}

/// Keep linked entries on/after `since`, capped to the source's limit.
fn recent_mentions(
    source: &SourceDescriptor,
    entries: Vec<FeedEntry>,
    since: chrono::NaiveDate,
) -> Vec<SignalDraft> {
    entries
        .into_iter()
        .filter(|e| !e.link.is_empty())
        .filter(|e| is_recent_enough(Some(e.published_at.as_str()), since))
        .take(source.item_limit)
        .map(mention_draft)
        .collect()
}

/// News search: the query template is filled per theme and sent to the
/// news search feed with a `when:Nd` window.
pub struct NewsSearchAdapter;

impl NewsSearchAdapter {
    pub fn feed_url(source: &SourceDescriptor, ctx: &RunContext) -> String {
        let base = fill_template(
            source.query_template.as_deref().unwrap_or("{theme}"),
            ctx.theme.search_text(),
            ctx.theme.period_days,
            ctx.since_date,
        );
        let days = ctx.theme.period_days.clamp(1, MAX_WHEN_DAYS);
        build_google_news_rss_url(&format!("{base} when:{days}d"))
    }
}

#[async_trait]
impl SourceAdapter for NewsSearchAdapter {
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput> {
        let url = Self::feed_url(source, ctx);
        let entries = fetch_entries(&url, ctx).await?;
        let drafts = recent_mentions(source, entries, ctx.since_date);
        Ok(AdapterOutput::Items(signals_from_drafts(source, drafts)))
    }

    fn name(&self) -> &'static str {
        "news_search"
    }
}

/// Direct feed at a fixed URL. `max_age_days` on the source overrides the
/// run's look-back window.
pub struct DirectFeedAdapter;

#[async_trait]
impl SourceAdapter for DirectFeedAdapter {
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput> {
        let url = source
            .url
            .as_deref()
            .context("direct feed source has no url")?;
        let entries = fetch_entries(url, ctx).await?;
        let since = match source.max_age_days {
            Some(days) => since_date(days, ctx.now),
            None => ctx.since_date,
        };
        let drafts = recent_mentions(source, entries, since);
        Ok(AdapterOutput::Items(signals_from_drafts(source, drafts)))
    }

    fn name(&self) -> &'static str {
        "direct_feed"
    }
}

/// Feed whose order is a leaderboard; no recency filter.
pub struct FeedRankingAdapter;

#[async_trait]
impl SourceAdapter for FeedRankingAdapter {
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput> {
        let url = source
            .url
            .as_deref()
            .context("ranking feed source has no url")?;
        let entries = fetch_entries(url, ctx).await?;
        let drafts = entries
            .into_iter()
            .filter(|e| !e.link.is_empty())
            .take(source.item_limit)
            .enumerate()
            .map(|(i, e)| SignalDraft {
                metric_label: MetricLabel::Rank,
                metric_value: (i + 1) as f64,
                ..mention_draft(e)
            })
            .collect();
        Ok(AdapterOutput::Items(signals_from_drafts(source, drafts)))
    }

    fn name(&self) -> &'static str {
        "feed_ranking"
    }
}
