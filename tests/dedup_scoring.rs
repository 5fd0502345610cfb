// tests/dedup_scoring.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use publishing_signal_digest::catalog::{SourceCategory, SourceKind};
use publishing_signal_digest::dedup::dedupe_signals;
use publishing_signal_digest::ingest::types::MetricLabel;
use publishing_signal_digest::scoring::{score_signal_at, score_signals};
use publishing_signal_digest::Signal;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 20, 3, 0, 0).unwrap()
}

fn signal(id: &str, url: &str, label: MetricLabel, value: f64, priority: u32) -> Signal {
    Signal {
        id: id.into(),
        source_id: format!("src_{id}"),
        source_name: "Source".into(),
        source_category: SourceCategory::IndustryNews,
        source_kind: SourceKind::GoogleNews,
        source_priority: priority,
        title: format!("title {id}"),
        summary: String::new(),
        url: url.into(),
        published_at: None,
        metric_label: label,
        metric_value: value,
        likes: if label == MetricLabel::Likes { value } else { 0.0 },
        cover_image_url: None,
    }
}

fn ranking(id: &str, url: &str, rank: f64) -> Signal {
    Signal {
        source_category: SourceCategory::Ranking,
        source_kind: SourceKind::TohanBestseller,
        ..signal(id, url, MetricLabel::Rank, rank, 3)
    }
}

fn ids(signals: &[Signal]) -> Vec<&str> {
    signals.iter().map(|s| s.id.as_str()).collect()
}

#[test]
fn dedup_is_idempotent() {
    let input = vec![
        signal("a", "https://x/1", MetricLabel::Mentions, 1.0, 3),
        signal("b", "https://x/1", MetricLabel::Likes, 20.0, 1),
        signal("c", "", MetricLabel::Mentions, 1.0, 2),
        ranking("r1", "https://shop/1", 1.0),
        ranking("r2", "https://shop/1", 2.0),
    ];
    let once = dedupe_signals(input);
    let twice = dedupe_signals(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn higher_metric_wins_tie_break() {
    let out = dedupe_signals(vec![
        signal("low", "https://x/1", MetricLabel::Likes, 5.0, 1),
        signal("high", "https://x/1", MetricLabel::Likes, 10.0, 1),
    ]);
    assert_eq!(ids(&out), vec!["high"]);
    assert_eq!(out[0].metric_value, 10.0);
}

#[test]
fn higher_priority_wins_when_metric_is_equal() {
    let out = dedupe_signals(vec![
        signal("weak", "https://x/1", MetricLabel::Mentions, 1.0, 1),
        signal("trusted", "https://x/1", MetricLabel::Mentions, 1.0, 5),
    ]);
    assert_eq!(ids(&out), vec!["trusted"]);
    assert_eq!(out[0].source_priority, 5);
}

#[test]
fn title_key_is_case_insensitive_and_keyless_signals_drop() {
    let mut a = signal("a", "", MetricLabel::Mentions, 1.0, 1);
    a.title = "Bestseller List".into();
    let mut b = signal("b", "", MetricLabel::Mentions, 1.0, 1);
    b.title = "  bestseller list ".into();
    let mut c = signal("c", "", MetricLabel::Mentions, 1.0, 1);
    c.title = String::new();
    assert_eq!(ids(&dedupe_signals(vec![a, b, c])), vec!["a"]);
}

#[test]
fn ranking_signals_are_never_merged() {
    let out = dedupe_signals(vec![
        ranking("r1", "https://shop/1", 1.0),
        signal("n", "https://news/1", MetricLabel::Mentions, 1.0, 3),
        ranking("r2", "https://shop/1", 2.0),
        ranking("r3", "https://shop/1", 3.0),
    ]);
    // other signals first, then every ranking signal in input order
    assert_eq!(ids(&out), vec!["n", "r1", "r2", "r3"]);
}

#[test]
fn more_likes_never_scores_lower() {
    let mut prev = f64::MIN;
    for likes in [0.0, 1.0, 9.0, 99.0, 500.0, 10_000.0, 1e9] {
        let s = score_signal_at(&signal("s", "https://x", MetricLabel::Likes, likes, 3), now());
        assert!(s >= prev, "likes {likes} scored {s} < {prev}");
        prev = s;
    }
    // capped at 40
    let capped = score_signal_at(&signal("s", "https://x", MetricLabel::Likes, 1e12, 0), now());
    assert_eq!(capped, 4.0 + 40.0 + 2.0);
}

#[test]
fn better_rank_scores_higher() {
    let first = score_signal_at(&signal("a", "https://x", MetricLabel::Rank, 1.0, 3), now());
    let tenth = score_signal_at(&signal("b", "https://x", MetricLabel::Rank, 10.0, 3), now());
    let deep = score_signal_at(&signal("c", "https://x", MetricLabel::Rank, 80.0, 3), now());
    let missing = score_signal_at(&signal("d", "https://x", MetricLabel::Rank, 0.0, 3), now());
    assert!(first > tenth);
    assert_eq!(first, 12.0 + 24.0 + 2.0);
    assert_eq!(tenth, 12.0 + 20.0 + 2.0);
    assert_eq!(deep, 12.0 + 2.0);
    assert_eq!(missing, deep);
}

#[test]
fn zero_priority_counts_as_one() {
    let s = score_signal_at(&signal("a", "https://x", MetricLabel::Mentions, 1.0, 0), now());
    assert_eq!(s, 4.0 + 6.0 + 2.0);
}

#[test]
fn recency_decays_in_steps() {
    let mut fresh = signal("a", "https://x", MetricLabel::Mentions, 1.0, 1);
    fresh.published_at = Some(now() - Duration::hours(3));
    let mut week = fresh.clone();
    week.published_at = Some(now() - Duration::hours(100));
    let mut stale = fresh.clone();
    stale.published_at = Some(now() - Duration::days(30));

    assert_eq!(score_signal_at(&fresh, now()), 4.0 + 6.0 + 12.0);
    assert_eq!(score_signal_at(&week, now()), 4.0 + 6.0 + 3.0);
    assert_eq!(score_signal_at(&stale, now()), 4.0 + 6.0 + 1.0);
}

#[test]
fn equal_scores_keep_input_order() {
    let input = vec![
        signal("first", "https://x/1", MetricLabel::Mentions, 1.0, 2),
        signal("top", "https://x/2", MetricLabel::Likes, 1000.0, 5),
        signal("second", "https://x/3", MetricLabel::Mentions, 1.0, 2),
        signal("third", "https://x/4", MetricLabel::Mentions, 1.0, 2),
    ];
    let scored = score_signals(input, now());
    let order: Vec<_> = scored.iter().map(|s| s.signal.id.as_str()).collect();
    assert_eq!(order, vec!["top", "first", "second", "third"]);
    assert!(scored.windows(2).all(|w| w[0].score >= w[1].score));
}
