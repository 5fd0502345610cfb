// src/digest.rs
//! Digest assembly: tokens, themes, clusters, materials and coverage.
//!
//! Everything here is synchronous and runs over the fully collected list.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::SourceCategory;
use crate::collector::{Collection, SourceStat};
use crate::ingest::types::{MetricLabel, Signal, SourceStatus, ThemeQuery};
use crate::scoring::{score_signals, ScoredSignal};

pub const MAX_THEMES: usize = 10;
pub const MAX_CLUSTERS: usize = 5;
pub const CLUSTER_POSTS: usize = 3;
pub const CLUSTER_KEYPHRASES: usize = 4;
pub const MIN_CLUSTER_DOCS: usize = 2;
pub const MAX_MATERIALS: usize = 20;
const CLUSTER_NAME_CHARS: usize = 12;
const FALLBACK_CLUSTER: &str = "主要トピック";

/// Token rank is `count * COUNT_WEIGHT + cumulative score`.
const COUNT_WEIGHT: f64 = 5.0;

const STOP_WORDS: [&str; 28] = [
    "こと", "これ", "それ", "ため", "よう", "から", "まで", "について", "および", "など",
    "する", "した", "いる", "ある", "れる", "より", "として", "the", "and", "with", "from",
    "this", "that", "news", "google", "times", "pr", "jp",
];

/// Lowercased alphanumeric runs (≥3) and CJK runs (≥2), minus stop words
/// and pure digits. Repeats are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"[a-z0-9]{3,}|[一-龠ぁ-んァ-ヶー]{2,}").unwrap());

    let lowered = text.to_lowercase();
    re.find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenStat {
    pub token: String,
    /// Number of signals containing the token.
    pub count: usize,
    /// Sum of the containing signals' scores.
    pub score: f64,
    /// Positions of the containing signals in the input.
    pub item_indexes: Vec<usize>,
}

impl TokenStat {
    pub fn rank(&self) -> f64 {
        self.count as f64 * COUNT_WEIGHT + self.score
    }
}

/// Per-token document stats, best first. Ties keep first-seen order.
pub fn token_stats<'a, I>(signals: I) -> Vec<TokenStat>
where
    I: IntoIterator<Item = &'a ScoredSignal>,
{
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut stats: Vec<TokenStat> = Vec::new();

    for (index, scored) in signals.into_iter().enumerate() {
        let text = format!("{} {}", scored.signal.title, scored.signal.summary);
        let mut seen: Vec<String> = Vec::new();
        for token in tokenize(&text) {
            if seen.contains(&token) {
                continue;
            }
            seen.push(token.clone());

            let at = *slot.entry(token.clone()).or_insert_with(|| {
                stats.push(TokenStat {
                    token,
                    count: 0,
                    score: 0.0,
                    item_indexes: Vec::new(),
                });
                stats.len() - 1
            });
            let row = &mut stats[at];
            row.count += 1;
            row.score += scored.score;
            row.item_indexes.push(index);
        }
    }

    stats.sort_by(|a, b| b.rank().partial_cmp(&a.rank()).unwrap_or(Ordering::Equal));
    stats
}

/// Post-shaped view of a scored signal, as rendered in clusters and
/// materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestPost {
    pub url: String,
    pub title: String,
    pub summary: String,
    /// Equal to `metric_value` for likes, else 0.
    pub likes: f64,
    pub metric_label: MetricLabel,
    pub metric_value: f64,
    pub source_name: String,
    pub source_category: SourceCategory,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&ScoredSignal> for DigestPost {
    fn from(scored: &ScoredSignal) -> Self {
        let s = &scored.signal;
        DigestPost {
            url: s.url.clone(),
            title: s.title.clone(),
            summary: s.summary.clone(),
            likes: if s.metric_label == MetricLabel::Likes {
                s.metric_value
            } else {
                0.0
            },
            metric_label: s.metric_label,
            metric_value: s.metric_value,
            source_name: s.source_name.clone(),
            source_category: s.source_category,
            published_at: s.published_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestCluster {
    pub name: String,
    pub keyphrases: Vec<String>,
    pub posts: Vec<DigestPost>,
}

pub fn build_themes(scored: &[ScoredSignal]) -> Vec<String> {
    token_stats(scored)
        .into_iter()
        .take(MAX_THEMES)
        .map(|row| row.token)
        .collect()
}

/// Clusters from the highest-ranked shared tokens. A candidate whose members
/// were all shown by an earlier cluster is skipped. With no qualifying token
/// the top signals form one unnamed topic.
pub fn build_clusters(scored: &[ScoredSignal]) -> Vec<DigestCluster> {
    let mut clusters = Vec::new();
    let mut used = vec![false; scored.len()];

    for row in token_stats(scored) {
        if clusters.len() >= MAX_CLUSTERS {
            break;
        }
        if row.count < MIN_CLUSTER_DOCS {
            continue;
        }

        let mut members = row.item_indexes.clone();
        members.sort_by(|&a, &b| {
            scored[b]
                .score
                .partial_cmp(&scored[a].score)
                .unwrap_or(Ordering::Equal)
        });
        members.truncate(CLUSTER_POSTS);

        if members.is_empty() || members.iter().all(|&i| used[i]) {
            continue;
        }
        for &i in &members {
            used[i] = true;
        }

        let member_signals: Vec<&ScoredSignal> = members.iter().map(|&i| &scored[i]).collect();
        let keyphrases = token_stats(member_signals.iter().copied())
            .into_iter()
            .take(CLUSTER_KEYPHRASES)
            .map(|r| r.token)
            .collect();

        clusters.push(DigestCluster {
            name: row.token.chars().take(CLUSTER_NAME_CHARS).collect(),
            keyphrases,
            posts: member_signals.into_iter().map(DigestPost::from).collect(),
        });
    }

    if !clusters.is_empty() || scored.is_empty() {
        return clusters;
    }

    vec![DigestCluster {
        name: FALLBACK_CLUSTER.to_string(),
        keyphrases: Vec::new(),
        posts: scored.iter().take(CLUSTER_POSTS).map(DigestPost::from).collect(),
    }]
}

pub fn build_materials(scored: &[ScoredSignal]) -> Vec<DigestPost> {
    scored.iter().take(MAX_MATERIALS).map(DigestPost::from).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub source_total: usize,
    pub source_ok: usize,
    pub source_error: usize,
    pub source_skipped: usize,
    pub signals: usize,
    pub before_dedupe: usize,
    pub duplicate_drop: usize,
}

pub fn build_coverage(stats: &[SourceStat], signals: usize, before_dedupe: usize) -> Coverage {
    let with = |status: SourceStatus| stats.iter().filter(|s| s.status == status).count();
    Coverage {
        source_total: stats.len(),
        source_ok: with(SourceStatus::Ok),
        source_error: with(SourceStatus::Error),
        source_skipped: with(SourceStatus::Skipped),
        signals,
        before_dedupe,
        duplicate_drop: before_dedupe.saturating_sub(signals),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Ok,
    OkWithXFallback,
    NoSignals,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Ok => "ok",
            ParseStatus::OkWithXFallback => "ok_with_x_fallback",
            ParseStatus::NoSignals => "no_signals",
        }
    }
}

/// Human label for a look-back window.
pub fn period_label(period_days: u32) -> String {
    match period_days {
        1 => "直近1日".to_string(),
        7 => "直近1週間".to_string(),
        30 => "直近1ヶ月".to_string(),
        365 => "直近1年".to_string(),
        n => format!("直近{n}日"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestPayload {
    pub clusters: Vec<DigestCluster>,
    pub themes: Vec<String>,
    pub materials: Vec<DigestPost>,
    pub source_stats: Vec<SourceStat>,
    pub coverage: Coverage,
    pub period_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDigest {
    pub parse_status: ParseStatus,
    pub query_with_since: String,
    pub raw_text: String,
    pub payload: DigestPayload,
}

/// Build the digest for one theme from a collection pass and its deduped
/// signals. Only signals with a URL are eligible as materials.
pub fn build_trend_payload(
    theme: &ThemeQuery,
    collection: &Collection,
    deduped: Vec<Signal>,
    now: DateTime<Utc>,
) -> TrendDigest {
    let eligible: Vec<Signal> = deduped.into_iter().filter(|s| !s.url.is_empty()).collect();
    let scored = score_signals(eligible, now);

    let before = collection.total_signals_before_dedupe();
    let coverage = build_coverage(&collection.source_stats, scored.len(), before);
    counter!("collector_signals_kept_total").increment(coverage.signals as u64);
    counter!("collector_dedup_drop_total").increment(coverage.duplicate_drop as u64);

    let social = collection.social_meta.as_ref();
    let parse_status = if scored.is_empty() {
        ParseStatus::NoSignals
    } else if social.is_some_and(|m| !m.parsed_json) {
        ParseStatus::OkWithXFallback
    } else {
        ParseStatus::Ok
    };

    let query_with_since = social
        .map(|m| m.query_with_since.clone())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| {
            format!(
                "{} source-window:{}..today",
                theme.search_text(),
                collection.since_date.format("%Y-%m-%d")
            )
        });
    let raw_text = social.map(|m| m.raw_text.clone()).unwrap_or_default();

    TrendDigest {
        parse_status,
        query_with_since,
        raw_text,
        payload: DigestPayload {
            clusters: build_clusters(&scored),
            themes: build_themes(&scored),
            materials: build_materials(&scored),
            source_stats: collection.source_stats.clone(),
            coverage,
            period_label: period_label(theme.period_days),
        },
    }
}
