// src/ingest/types.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::catalog::{SourceCategory, SourceDescriptor, SourceKind};
use crate::ingest::fetch::PageFetcher;
use crate::ingest::{create_id, normalize_url, parse_published, truncate, TEXT_LIMIT};
use crate::social::client::SocialSearchClient;
use crate::social::normalize::TrendData;

/// What `metric_value` means for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricLabel {
    /// Engagement count (social).
    Likes,
    /// Leaderboard position, 1 = best.
    Rank,
    /// Constant presence marker (feeds, news pages).
    Mentions,
    #[default]
    Score,
    /// No ordering semantics (deals).
    #[serde(rename = "")]
    Unranked,
}

/// The normalized unit produced by every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    pub source_category: SourceCategory,
    pub source_kind: SourceKind,
    pub source_priority: u32,
    pub title: String,
    pub summary: String,
    /// Canonical http(s) URL or empty.
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub metric_label: MetricLabel,
    pub metric_value: f64,
    pub likes: f64,
    pub cover_image_url: Option<String>,
}

/// Raw adapter output for one item, before normalization into a [`Signal`].
#[derive(Debug, Clone, Default)]
pub struct SignalDraft {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: Option<String>,
    pub metric_label: MetricLabel,
    pub metric_value: f64,
    pub cover_image_url: Option<String>,
}

impl Signal {
    /// Normalize a draft against its source. Drafts with neither a usable URL
    /// nor any text are dropped.
    pub fn from_draft(source: &SourceDescriptor, draft: SignalDraft) -> Option<Signal> {
        Self::from_draft_with_limit(source, draft, TEXT_LIMIT)
    }

    pub fn from_draft_with_limit(
        source: &SourceDescriptor,
        draft: SignalDraft,
        limit: usize,
    ) -> Option<Signal> {
        let url = normalize_url(&draft.url);
        let title_src = if draft.title.trim().is_empty() {
            &draft.summary
        } else {
            &draft.title
        };
        let summary_src = if draft.summary.trim().is_empty() {
            &draft.title
        } else {
            &draft.summary
        };
        let title = truncate(title_src, limit);
        let summary = truncate(summary_src, limit);
        if url.is_empty() && title.is_empty() {
            return None;
        }

        let metric_value = if draft.metric_value.is_finite() {
            draft.metric_value
        } else {
            0.0
        };
        let likes = if draft.metric_label == MetricLabel::Likes {
            metric_value
        } else {
            0.0
        };

        Some(Signal {
            id: create_id("sig"),
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            source_category: source.category,
            source_kind: source.kind,
            source_priority: source.priority,
            title,
            summary,
            url,
            published_at: draft.published_at.as_deref().and_then(parse_published),
            metric_label: draft.metric_label,
            metric_value,
            likes,
            cover_image_url: draft.cover_image_url,
        })
    }
}

/// Normalize a batch of drafts for one source, keeping order.
pub fn signals_from_drafts(source: &SourceDescriptor, drafts: Vec<SignalDraft>) -> Vec<Signal> {
    drafts
        .into_iter()
        .filter_map(|d| Signal::from_draft(source, d))
        .collect()
}

/// Per-source outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Error,
    Skipped,
    Cached,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Error => "error",
            SourceStatus::Skipped => "skipped",
            SourceStatus::Cached => "cached",
        }
    }
}

/// Diagnostics surfaced by the social search adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialMeta {
    pub query_with_since: String,
    /// False when the search client's answer had to be parsed as free text.
    pub parsed_json: bool,
    pub trend: TrendData,
    pub raw_text: String,
}

/// What an adapter hands back for one source.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutput {
    Items(Vec<Signal>),
    Social {
        items: Vec<Signal>,
        meta: SocialMeta,
    },
    /// Capability intentionally absent (e.g. missing credential).
    Skipped { reason: String },
}

impl AdapterOutput {
    pub fn status(&self) -> SourceStatus {
        match self {
            AdapterOutput::Skipped { .. } => SourceStatus::Skipped,
            _ => SourceStatus::Ok,
        }
    }
}

/// Topic descriptor driving one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeQuery {
    pub name: String,
    pub query: String,
    pub period_days: u32,
}

impl ThemeQuery {
    /// Query text used for templates; falls back to the display name.
    pub fn search_text(&self) -> &str {
        if self.query.trim().is_empty() {
            &self.name
        } else {
            &self.query
        }
    }
}

/// Credentials for the social search adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialCredentials {
    pub api_key: String,
    pub model: String,
}

/// Shared, read-only state for every adapter in a run.
#[derive(Clone)]
pub struct RunContext {
    pub theme: ThemeQuery,
    pub since_date: NaiveDate,
    pub now: DateTime<Utc>,
    pub timeout: Duration,
    pub max_response_bytes: usize,
    pub social: Option<SocialCredentials>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub social_client: Arc<dyn SocialSearchClient>,
}

/// One adapter per source kind.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput>;
    fn name(&self) -> &'static str;
}
