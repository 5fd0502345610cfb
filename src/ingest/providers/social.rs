// src/ingest/providers/social.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog::SourceDescriptor;
use crate::ingest::since_date;
use crate::ingest::types::{
    signals_from_drafts, AdapterOutput, MetricLabel, RunContext, SignalDraft, SocialMeta,
    SourceAdapter,
};
use crate::social::normalize::{parse_search_response, SocialPost};

/// The social window is fixed; popular posts need a few days to surface.
pub const SOCIAL_WINDOW_DAYS: u32 = 7;

const SOCIAL_QUERY: &str = "出版社 OR 書評 OR 新刊 OR ベストセラー OR 重版 -同人誌 -コミケ";
const TITLE_CHARS: usize = 42;
const UNTITLED_POST: &str = "X上の投稿";

pub fn build_social_query(now: DateTime<Utc>) -> String {
    let since = since_date(SOCIAL_WINDOW_DAYS, now);
    format!("{SOCIAL_QUERY} since:{}", since.format("%Y-%m-%d"))
}

/// First 42 chars of the post (plus `…` when cut); the full text stays in
/// the summary.
pub fn short_title(text: &str) -> String {
    if text.chars().count() > TITLE_CHARS {
        let mut t: String = text.chars().take(TITLE_CHARS).collect();
        t.push('…');
        t
    } else if text.is_empty() {
        UNTITLED_POST.to_string()
    } else {
        text.to_string()
    }
}

fn post_draft(post: &SocialPost) -> SignalDraft {
    SignalDraft {
        title: short_title(&post.summary),
        summary: post.summary.clone(),
        url: post.url.clone(),
        metric_label: MetricLabel::Likes,
        metric_value: post.likes,
        ..Default::default()
    }
}

/// Candidate posts from the LLM-backed social search. Without a credential
/// the source is skipped rather than failed.
pub struct SocialSearchAdapter;

#[async_trait]
impl SourceAdapter for SocialSearchAdapter {
    async fn collect(&self, source: &SourceDescriptor, ctx: &RunContext) -> Result<AdapterOutput> {
        let Some(creds) = ctx.social.as_ref().filter(|c| !c.api_key.trim().is_empty()) else {
            return Ok(AdapterOutput::Skipped {
                reason: "XAI_API_KEY is not set".to_string(),
            });
        };

        let query = build_social_query(ctx.now);
        let raw = ctx
            .social_client
            .search(&creds.api_key, &creds.model, &query)
            .await?;
        let parsed = parse_search_response(&raw);

        let drafts = parsed
            .data
            .materials
            .iter()
            .filter(|p| !p.url.is_empty())
            .take(source.item_limit)
            .map(post_draft)
            .collect();

        Ok(AdapterOutput::Social {
            items: signals_from_drafts(source, drafts),
            meta: SocialMeta {
                query_with_since: query,
                parsed_json: parsed.ok,
                trend: parsed.data,
                raw_text: parsed.raw_text,
            },
        })
    }

    fn name(&self) -> &'static str {
        "social_search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn short_title_cuts_at_42_chars() {
        let long = "あ".repeat(50);
        let t = short_title(&long);
        assert_eq!(t.chars().count(), 43);
        assert!(t.ends_with('…'));
        assert_eq!(short_title("短い"), "短い");
        assert_eq!(short_title(""), UNTITLED_POST);
    }

    #[test]
    fn query_uses_seven_day_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap();
        assert!(build_social_query(now).ends_with("since:2026-03-03"));
    }
}
