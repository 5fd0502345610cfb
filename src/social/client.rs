// src/social/client.rs
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.x.ai/v1/responses";

/// Error bodies are cut to this many chars in messages.
const ERROR_BODY_CHARS: usize = 400;

const SYSTEM_PROMPT: &str = r#"You analyse the Japanese publishing industry. Use the x_search tool to find widely shared X posts for the user's query.
Search Top mode first (min_faves:10, limit:30); if fewer than 5 posts turn up, add Latest mode (min_faves:5, limit:20).
Merge, sort by likes descending and keep the top 10 as materials.
Prefer commercial publishers, bookstores, critics, authors, editors and trade media. Exclude doujinshi, fan works and individual posting platforms.
Summaries are short Japanese paraphrases, never copies of the post.
Reply with JSON only, no markdown, even when nothing is found:
{"editorialSummary": "...", "clusters": [{"name": "...", "keyphrases": ["..."], "posts": [{"url": "...", "summary": "...", "likes": 0}]}], "themes": ["..."], "materials": [{"url": "...", "summary": "...", "likes": 0}]}"#;

/// External social search. Returns the raw response body; interpretation
/// lives in [`crate::social::normalize`].
#[async_trait]
pub trait SocialSearchClient: Send + Sync {
    async fn search(&self, api_key: &str, model: &str, query: &str) -> Result<String>;
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<Message<'a>>,
    tools: Vec<Tool>,
    temperature: f32,
}

/// Responses-API client with the x_search tool enabled.
pub struct XaiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl XaiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building social search client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SocialSearchClient for XaiClient {
    async fn search(&self, api_key: &str, model: &str, query: &str) -> Result<String> {
        let body = ResponsesRequest {
            model,
            instructions: SYSTEM_PROMPT,
            input: vec![Message {
                role: "user",
                content: query,
            }],
            tools: vec![Tool { kind: "x_search" }],
            temperature: 0.3,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("social search request")?;
        let status = resp.status();
        let text = resp.text().await.context("reading social search body")?;

        if !status.is_success() {
            let head: String = text.chars().take(ERROR_BODY_CHARS).collect();
            bail!("social search API error {}: {head}", status.as_u16());
        }
        Ok(text)
    }
}

// --- Test helper ---

/// Answers every search with the same canned body (or error) and records
/// the queries it saw.
pub struct StaticSocialClient {
    reply: std::result::Result<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticSocialClient {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            reply: Ok(body.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Envelope carrying `payload` as the assistant's `output_text`.
    pub fn with_payload(payload: &serde_json::Value) -> Self {
        let envelope = serde_json::json!({ "output_text": payload.to_string() });
        Self::ok(envelope.to_string())
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SocialSearchClient for StaticSocialClient {
    async fn search(&self, _api_key: &str, _model: &str, query: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(query.to_string());
        }
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}
