// src/ingest/providers/rakuten.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::catalog::SourceDescriptor;
use crate::ingest::fetch::FetchRequest;
use crate::ingest::types::{
    signals_from_drafts, AdapterOutput, MetricLabel, RunContext, SignalDraft, SourceAdapter,
};

const RANKING_API: &str =
    "https://rdc-api-catalog-gateway-api.rakuten.co.jp/books/rank/001/hourly.json";

#[derive(Debug, Deserialize)]
struct RankingResponse {
    #[serde(default)]
    data: Vec<RankingItem>,
}

#[derive(Debug, Deserialize)]
struct RankingItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Hourly book ranking from the storefront's JSON endpoint.
pub struct RakutenRankingAdapter;

impl RakutenRankingAdapter {
    pub fn api_url(limit: usize) -> String {
        format!("{RANKING_API}?hits={limit}&page=1&period=0&sid=10")
    }

    pub fn parse(source: &SourceDescriptor, body: &str) -> Result<Vec<SignalDraft>> {
        let resp: RankingResponse =
            serde_json::from_str(body).context("parsing ranking json")?;
        Ok(resp
            .data
            .into_iter()
            .take(source.item_limit)
            .enumerate()
            .map(|(i, item)| {
                let title = item.title.unwrap_or_default();
                SignalDraft {
                    summary: format!("{title}（楽天ブックスランキング）"),
                    title,
                    url: item.url.unwrap_or_default(),
                    metric_label: MetricLabel::Rank,
                    metric_value: (i + 1) as f64,
                    ..Default::default()
                }
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for RakutenRankingAdapter {
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput> {
        let url = Self::api_url(source.item_limit);
        let req = FetchRequest::new(ctx.timeout, ctx.max_response_bytes);
        let body = ctx.fetcher.fetch_text(&url, &req).await?;
        let drafts = Self::parse(source, &body)?;
        Ok(AdapterOutput::Items(signals_from_drafts(source, drafts)))
    }

    fn name(&self) -> &'static str {
        "rakuten_ranking"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    fn source() -> SourceDescriptor {
        default_catalog()
            .into_iter()
            .find(|s| s.id == "ranking_rakuten_books")
            .unwrap()
    }

    #[test]
    fn api_url_carries_limit() {
        assert!(RakutenRankingAdapter::api_url(10).contains("hits=10&page=1"));
    }

    #[test]
    fn parses_ranked_items() {
        let body = r#"{"data":[{"title":"本A","url":"https://books.rakuten.co.jp/rb/1/"},{"title":"本B"}]}"#;
        let drafts = RakutenRankingAdapter::parse(&source(), body).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].metric_value, 1.0);
        assert_eq!(drafts[1].summary, "本B（楽天ブックスランキング）");
        assert!(drafts[1].url.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(RakutenRankingAdapter::parse(&source(), "<html>").is_err());
    }
}
