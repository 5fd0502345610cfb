// src/ingest/fetch.rs
//! Page/feed fetching boundary.
//!
//! Adapters never talk to `reqwest` directly; they go through [`PageFetcher`]
//! so that tests can feed fixtures and so that every request carries the
//! same timeout and size guards.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rand::seq::IndexedRandom;

pub const DEFAULT_USER_AGENT: &str = "PublishingSignalDigest/0.2 (+https://localhost)";

/// Floor for the response size cap.
pub const MIN_RESPONSE_BYTES: usize = 64 * 1024;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml,text/xml;q=0.9,*/*;q=0.8";

/// Browser user agents rotated for storefront pages with bot detection.
const BROWSER_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:134.0) Gecko/20100101 Firefox/134.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub timeout: Duration,
    pub max_bytes: usize,
    pub headers: Vec<(&'static str, String)>,
}

impl FetchRequest {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        Self {
            timeout,
            max_bytes: max_bytes.max(MIN_RESPONSE_BYTES),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` as text. Fails on non-2xx, timeout or oversize bodies.
    async fn fetch_text(&self, url: &str, req: &FetchRequest) -> Result<String>;
}

/// Production fetcher on a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str, req: &FetchRequest) -> Result<String> {
        let mut builder = self
            .client
            .get(url)
            .timeout(req.timeout)
            .header(reqwest::header::ACCEPT, ACCEPT);
        for (name, value) in &req.headers {
            builder = builder.header(*name, value.as_str());
        }

        let mut resp = builder
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        if let Some(len) = resp.content_length() {
            if len as usize > req.max_bytes {
                bail!("response too large: {len} bytes (max {})", req.max_bytes);
            }
        }

        let status = resp.status();
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await.context("reading response body")? {
            if body.len() + chunk.len() > req.max_bytes {
                bail!("response too large (max {} bytes)", req.max_bytes);
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            bail!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

// --- Test helper ---

/// Serves canned bodies by URL; unknown URLs fail. Records every request.
/// A configured delay longer than the request timeout fails like a real
/// timed-out fetch.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, std::result::Result<String, String>>,
    delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Err(message.into()));
        self
    }

    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch_text(&self, url: &str, req: &FetchRequest) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::time::timeout(req.timeout, tokio::time::sleep(*delay))
                .await
                .map_err(|_| anyhow!("request timed out after {} ms: {url}", req.timeout.as_millis()))?;
        }
        match self.pages.get(url) {
            Some(Ok(body)) if body.len() > req.max_bytes => {
                Err(anyhow!("response too large (max {} bytes)", req.max_bytes))
            }
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(msg)) => Err(anyhow!(msg.clone())),
            None => Err(anyhow!("404 Not Found: {url}")),
        }
    }
}
