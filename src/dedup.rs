// src/dedup.rs
//! Merge duplicate signals across sources.
//!
//! Ranking signals are exempt: every leaderboard keeps its own entries and
//! order. Other signals are keyed by canonical URL, else lowercased title;
//! on collision the higher [`tie_break_weight`] wins and takes the slot of
//! the first occurrence.

use std::collections::HashMap;

use crate::catalog::SourceCategory;
use crate::ingest::types::Signal;

/// Trust multiplier applied to source priority when breaking ties.
pub const PRIORITY_TIE_WEIGHT: f64 = 3.0;

/// `u:<url>` or `t:<lowercased title>`; `None` when neither exists.
pub fn dedup_key(signal: &Signal) -> Option<String> {
    let url = signal.url.trim();
    if !url.is_empty() {
        return Some(format!("u:{url}"));
    }
    let title = signal.title.trim().to_lowercase();
    if title.is_empty() {
        None
    } else {
        Some(format!("t:{title}"))
    }
}

pub fn tie_break_weight(signal: &Signal) -> f64 {
    signal.metric_value + f64::from(signal.source_priority) * PRIORITY_TIE_WEIGHT
}

/// Kept non-ranking signals (first-seen order) followed by every ranking
/// signal unchanged.
pub fn dedupe_signals(signals: Vec<Signal>) -> Vec<Signal> {
    let (ranking, other): (Vec<Signal>, Vec<Signal>) = signals
        .into_iter()
        .partition(|s| s.source_category == SourceCategory::Ranking);

    let mut slot_by_key: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<Signal> = Vec::with_capacity(other.len() + ranking.len());

    for signal in other {
        let Some(key) = dedup_key(&signal) else {
            continue;
        };
        match slot_by_key.get(&key) {
            Some(&slot) => {
                if tie_break_weight(&signal) > tie_break_weight(&kept[slot]) {
                    kept[slot] = signal;
                }
            }
            None => {
                slot_by_key.insert(key, kept.len());
                kept.push(signal);
            }
        }
    }

    kept.extend(ranking);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SourceCategory, SourceKind};
    use crate::ingest::types::MetricLabel;

    fn sig(url: &str, title: &str) -> Signal {
        Signal {
            id: "x".into(),
            source_id: "s".into(),
            source_name: "S".into(),
            source_category: SourceCategory::IndustryNews,
            source_kind: SourceKind::GoogleNews,
            source_priority: 1,
            title: title.into(),
            summary: String::new(),
            url: url.into(),
            published_at: None,
            metric_label: MetricLabel::Mentions,
            metric_value: 1.0,
            likes: 0.0,
            cover_image_url: None,
        }
    }

    #[test]
    fn key_prefers_url_then_title() {
        assert_eq!(dedup_key(&sig("https://a/", "T")).unwrap(), "u:https://a/");
        assert_eq!(dedup_key(&sig("", " Book ")).unwrap(), "t:book");
        assert!(dedup_key(&sig("", "  ")).is_none());
    }

    #[test]
    fn equal_weight_keeps_first() {
        let mut a = sig("https://a/", "first");
        a.id = "a".into();
        let mut b = sig("https://a/", "second");
        b.id = "b".into();
        let out = dedupe_signals(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn winner_takes_first_slot() {
        let a = sig("https://a/", "a");
        let b = sig("https://b/", "b");
        let mut a2 = sig("https://a/", "a2");
        a2.metric_value = 9.0;
        let out = dedupe_signals(vec![a, b, a2]);
        let titles: Vec<_> = out.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["a2", "b"]);
    }
}
