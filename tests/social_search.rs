// tests/social_search.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use publishing_signal_digest::catalog::{CostTier, SourceCategory, SourceDescriptor, SourceKind};
use publishing_signal_digest::ingest::fetch::FixtureFetcher;
use publishing_signal_digest::ingest::providers::social::SocialSearchAdapter;
use publishing_signal_digest::ingest::types::{
    AdapterOutput, MetricLabel, RunContext, SocialCredentials, SourceAdapter, ThemeQuery,
};
use publishing_signal_digest::social::{parse_search_response, StaticSocialClient};
use serde_json::json;

fn social_source() -> SourceDescriptor {
    SourceDescriptor {
        id: "x_grok_social".into(),
        kind: SourceKind::XGrok,
        name: "X / Grok x_search".into(),
        category: SourceCategory::Social,
        cost_tier: CostTier::Api,
        priority: 5,
        item_limit: 14,
        url: None,
        fallback_urls: vec![],
        query_template: None,
        max_age_days: None,
    }
}

fn ctx(client: Arc<StaticSocialClient>, key: Option<&str>) -> RunContext {
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
        social: key.map(|k| SocialCredentials {
            api_key: k.into(),
            model: "grok-4-1-fast".into(),
        }),
        fetcher: Arc::new(FixtureFetcher::new()),
        social_client: client,
    }
}

#[tokio::test]
async fn missing_key_is_skipped_without_calling_the_client() {
    let client = Arc::new(StaticSocialClient::ok("{}"));
    for key in [None, Some("   ")] {
        let out = SocialSearchAdapter
            .collect(&social_source(), &ctx(client.clone(), key))
            .await
            .unwrap();
        assert!(matches!(out, AdapterOutput::Skipped { .. }));
    }
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn materials_become_likes_signals() {
    let long = "重版が決まりました！".repeat(6);
    let client = Arc::new(StaticSocialClient::with_payload(&json!({
        "clusters": [],
        "themes": ["重版"],
        "materials": [
            {"url": "https://x.com/a/status/1", "summary": "新刊が書店で平積みに", "likes": 40},
            {"url": "https://x.com/b/status/2", "summary": long, "likes": 500},
            {"url": "", "summary": "リンクなし", "likes": 9000}
        ]
    })));

    let out = SocialSearchAdapter
        .collect(&social_source(), &ctx(client.clone(), Some("k")))
        .await
        .unwrap();
    let AdapterOutput::Social { items, meta } = out else {
        panic!("expected social output");
    };

    assert!(meta.parsed_json);
    assert_eq!(meta.query_with_since, client.queries()[0]);
    assert!(meta.query_with_since.contains("since:2026-02-13"));
    assert_eq!(items.len(), 2);
    // most liked first
    assert_eq!(items[0].likes, 500.0);
    assert_eq!(items[0].metric_label, MetricLabel::Likes);
    assert!(items[0].title.ends_with('…'));
    assert_eq!(items[0].title.chars().count(), 43);
    assert_eq!(items[1].title, "新刊が書店で平積みに");
}

#[tokio::test]
async fn free_text_answer_is_flagged_not_failed() {
    let envelope = json!({"output_text": "今日は特に話題がありません"}).to_string();
    let client = Arc::new(StaticSocialClient::ok(envelope));

    let out = SocialSearchAdapter
        .collect(&social_source(), &ctx(client, Some("k")))
        .await
        .unwrap();
    let AdapterOutput::Social { items, meta } = out else {
        panic!("expected social output");
    };
    assert!(items.is_empty());
    assert!(!meta.parsed_json);
    assert_eq!(meta.raw_text, "今日は特に話題がありません");
}

#[tokio::test]
async fn client_error_is_a_source_error() {
    let client = Arc::new(StaticSocialClient::failing("social search API error 500: boom"));
    let err = SocialSearchAdapter
        .collect(&social_source(), &ctx(client, Some("k")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[test]
fn output_array_envelope_is_read() {
    let payload = json!({"materials": [{"url": "https://x.com/c/status/3", "likes": 7}]});
    let envelope = json!({
        "output": [
            {"type": "reasoning", "content": [{"type": "text", "text": "thinking"}]},
            {"type": "message", "role": "assistant", "content": [
                {"type": "output_text", "text": format!("```json\n{payload}\n```")}
            ]}
        ]
    });
    let parsed = parse_search_response(&envelope.to_string());
    assert!(parsed.ok);
    assert_eq!(parsed.data.materials.len(), 1);
    assert_eq!(parsed.data.materials[0].likes, 7.0);
}

#[test]
fn garbage_response_is_empty_but_well_formed() {
    let parsed = parse_search_response("<html>502 Bad Gateway</html>");
    assert!(!parsed.ok);
    assert!(parsed.data.materials.is_empty());
    assert!(parsed.raw_text.is_empty());
}
