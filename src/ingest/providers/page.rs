// src/ingest/providers/page.rs
//! Generic HTML page adapter: fetch, detect bot walls, hand the body to a
//! site-specific [`PageExtractor`], then normalize entries into signals.

use std::ops::Range;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use rand::Rng;
use regex::Regex;

use crate::catalog::SourceDescriptor;
use crate::ingest::fetch::{random_user_agent, FetchRequest};
use crate::ingest::types::{
    signals_from_drafts, AdapterOutput, MetricLabel, RunContext, SignalDraft, SourceAdapter,
};

const ACCEPT_LANGUAGE: &str = "ja,en-US;q=0.9";

/// One item lifted out of a page, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageEntry {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub cover_image_url: Option<String>,
}

/// Site-specific HTML extraction. Synchronous: parsed documents never cross
/// an await point.
pub trait PageExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// At most `limit` entries, best first.
    fn extract(&self, html: &str, limit: usize) -> Vec<PageEntry>;

    /// True when the page is an interstitial instead of content.
    fn is_blocked(&self, _html: &str) -> bool {
        false
    }
}

/// How the position of an entry maps onto the signal metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMetric {
    /// 1-based position.
    Rank,
    /// Constant 1.
    Mentions,
    /// No ordering (value 0).
    Unranked,
}

impl PageMetric {
    fn apply(self, position: usize) -> (MetricLabel, f64) {
        match self {
            PageMetric::Rank => (MetricLabel::Rank, (position + 1) as f64),
            PageMetric::Mentions => (MetricLabel::Mentions, 1.0),
            PageMetric::Unranked => (MetricLabel::Unranked, 0.0),
        }
    }
}

pub struct PageAdapter<E> {
    extractor: E,
    metric: PageMetric,
    browser_headers: bool,
    referer: Option<&'static str>,
    delay_ms: Option<Range<u64>>,
}

impl<E: PageExtractor> PageAdapter<E> {
    pub fn new(extractor: E, metric: PageMetric) -> Self {
        Self {
            extractor,
            metric,
            browser_headers: false,
            referer: None,
            delay_ms: None,
        }
    }

    /// Send a rotating browser user agent.
    pub fn with_browser_headers(mut self) -> Self {
        self.browser_headers = true;
        self
    }

    pub fn with_referer(mut self, referer: &'static str) -> Self {
        self.referer = Some(referer);
        self
    }

    /// Random pause before each URL attempt.
    pub fn with_politeness_delay(mut self, range_ms: Range<u64>) -> Self {
        self.delay_ms = Some(range_ms);
        self
    }

    fn request(&self, ctx: &RunContext) -> FetchRequest {
        let mut req = FetchRequest::new(ctx.timeout, ctx.max_response_bytes)
            .header("Accept-Language", ACCEPT_LANGUAGE);
        if self.browser_headers {
            req = req.header("User-Agent", random_user_agent());
        }
        if let Some(referer) = self.referer {
            req = req.header("Referer", referer);
        }
        req
    }

    async fn pause(&self) {
        let Some(range) = self.delay_ms.as_ref().filter(|r| !r.is_empty()) else {
            return;
        };
        let ms = rand::rng().random_range(range.clone());
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Try one URL; `Err` carries the reason this URL yielded nothing.
    async fn attempt(&self, url: &str, limit: usize, ctx: &RunContext) -> Result<Vec<PageEntry>> {
        self.pause().await;
        let html = ctx
            .fetcher
            .fetch_text(url, &self.request(ctx))
            .await
            .map_err(|e| anyhow!("{url}: {e:#}"))?;

        if self.extractor.is_blocked(&html) {
            counter!("collector_page_blocked_total").increment(1);
            return Err(anyhow!("robot check detected: {url}"));
        }
        let entries = self.extractor.extract(&html, limit);
        if entries.is_empty() {
            return Err(anyhow!("no items extracted: {url}"));
        }
        Ok(entries)
    }
}

#[async_trait]
impl<E: PageExtractor> SourceAdapter for PageAdapter<E> {
    /// URLs are tried in order; the first one yielding entries wins. When
    /// all fail, the last reason is reported.
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput> {
        let mut last_error: Option<anyhow::Error> = None;

        for url in source.urls() {
            match self.attempt(url, source.item_limit, ctx).await {
                Ok(entries) => {
                    let drafts = entries
                        .into_iter()
                        .take(source.item_limit)
                        .enumerate()
                        .map(|(i, e)| {
                            let (metric_label, metric_value) = self.metric.apply(i);
                            SignalDraft {
                                title: e.title,
                                summary: e.summary,
                                url: e.url,
                                published_at: None,
                                metric_label,
                                metric_value,
                                cover_image_url: e.cover_image_url,
                            }
                        })
                        .collect();
                    return Ok(AdapterOutput::Items(signals_from_drafts(source, drafts)));
                }
                Err(e) => {
                    tracing::debug!(
                        target: "collector",
                        source_id = %source.id,
                        extractor = self.extractor.name(),
                        error = %e,
                        "page attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("all URLs failed")))
    }

    fn name(&self) -> &'static str {
        self.extractor.name()
    }
}

/// Collapse whitespace the way page text is compared.
pub fn squash_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `text` is just a price ("¥1,980", "USD 12.98", "税込 990円").
pub fn is_likely_price_text(text: &str) -> bool {
    static RE_LABEL: OnceCell<Regex> = OnceCell::new();
    static RE_TAX: OnceCell<Regex> = OnceCell::new();
    static RE_PRICE: OnceCell<Regex> = OnceCell::new();

    let normalized = squash_ws(text);
    if normalized.is_empty() {
        return false;
    }
    let re_label = RE_LABEL.get_or_init(|| Regex::new(r"(?i)^価格\s*[:：]?\s*").unwrap());
    let re_tax = RE_TAX.get_or_init(|| Regex::new(r"(?i)^(?:税込|税抜)\s*").unwrap());
    let re_price = RE_PRICE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?:USD|US\$|JPY|JP¥|EUR|GBP|CAD|AUD|HKD|SGD|CNY|RMB|KRW)\s*)?[¥￥$€£]?\s*\d[\d,，]*(?:\.\d+)?\s*(?:円|ドル|USD|JPY|EUR|GBP)?$",
        )
        .unwrap()
    });

    let compact = re_label.replace(&normalized, "");
    let compact = re_tax.replace(&compact, "");
    re_price.is_match(compact.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_heuristic() {
        assert!(is_likely_price_text("¥1,980"));
        assert!(is_likely_price_text("USD 12.98"));
        assert!(is_likely_price_text("価格： 税込 990円"));
        assert!(!is_likely_price_text("10C Vol.7【表紙：MILK】"));
        assert!(!is_likely_price_text(""));
    }

    #[test]
    fn metric_mapping() {
        assert_eq!(PageMetric::Rank.apply(0), (MetricLabel::Rank, 1.0));
        assert_eq!(PageMetric::Mentions.apply(4), (MetricLabel::Mentions, 1.0));
        assert_eq!(PageMetric::Unranked.apply(2), (MetricLabel::Unranked, 0.0));
    }
}
