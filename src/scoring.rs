// src/scoring.rs
//! Relevance score: `priority × 4 + metric boost + recency boost`.
//!
//! The breakpoints are empirical and kept as named constants.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::{MetricLabel, Signal};

pub const PRIORITY_WEIGHT: f64 = 4.0;

pub const LIKES_SCALE: f64 = 12.0;
pub const LIKES_CAP: f64 = 40.0;

/// Rank boost is `RANK_BASE - rank`, clamped to `[0, RANK_CAP]`.
pub const RANK_BASE: f64 = 30.0;
pub const RANK_CAP: f64 = 24.0;
/// Rank used when a ranked signal carries no position.
pub const MISSING_RANK: f64 = 100.0;

pub const FLAT_METRIC_BOOST: f64 = 6.0;

/// `(max age in hours, boost)`, checked in order.
pub const RECENCY_STEPS: [(f64, f64); 4] = [(12.0, 12.0), (24.0, 9.0), (72.0, 6.0), (168.0, 3.0)];
pub const RECENCY_STALE: f64 = 1.0;
pub const RECENCY_UNKNOWN: f64 = 2.0;

/// A signal with its computed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub score: f64,
}

pub fn metric_boost(signal: &Signal) -> f64 {
    match signal.metric_label {
        MetricLabel::Likes => {
            ((signal.metric_value + 1.0).log10() * LIKES_SCALE).clamp(0.0, LIKES_CAP)
        }
        MetricLabel::Rank => {
            let rank = if signal.metric_value == 0.0 {
                MISSING_RANK
            } else {
                signal.metric_value
            };
            (RANK_BASE - rank).clamp(0.0, RANK_CAP)
        }
        _ => FLAT_METRIC_BOOST,
    }
}

pub fn recency_boost(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published_at else {
        return RECENCY_UNKNOWN;
    };
    let age_hours = (now - published).num_milliseconds() as f64 / 3_600_000.0;
    RECENCY_STEPS
        .iter()
        .find(|(max_hours, _)| age_hours <= *max_hours)
        .map(|(_, boost)| *boost)
        .unwrap_or(RECENCY_STALE)
}

pub fn score_signal_at(signal: &Signal, now: DateTime<Utc>) -> f64 {
    let priority = f64::from(signal.source_priority.max(1)) * PRIORITY_WEIGHT;
    let metric = metric_boost(signal);
    // log10 of a negative like count is NaN; treat it as no boost
    let metric = if metric.is_nan() { 0.0 } else { metric };
    priority + metric + recency_boost(signal.published_at, now)
}

/// Score and sort descending. Equal scores keep input order.
pub fn score_signals(signals: Vec<Signal>, now: DateTime<Utc>) -> Vec<ScoredSignal> {
    let mut scored: Vec<ScoredSignal> = signals
        .into_iter()
        .map(|signal| {
            let score = score_signal_at(&signal, now);
            ScoredSignal { signal, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}
