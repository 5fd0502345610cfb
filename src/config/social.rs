// src/config/social.rs
use std::time::Duration;

use crate::ingest::types::SocialCredentials;
use crate::social::client::DEFAULT_ENDPOINT;

pub const DEFAULT_MODEL: &str = "grok-4-1-fast";

/// Model name recorded on runs that had no social credential.
pub const NO_MODEL: &str = "no_x_model";

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SocialConfig {
    /// Empty or absent disables the social source (reported as skipped).
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl SocialConfig {
    /// `XAI_API_KEY`, `XAI_MODEL`, `XAI_ENDPOINT`, `XAI_TIMEOUT_MS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();
        cfg.api_key = non_empty("XAI_API_KEY");
        if let Some(model) = non_empty("XAI_MODEL") {
            cfg.model = model;
        }
        if let Some(endpoint) = non_empty("XAI_ENDPOINT") {
            cfg.endpoint = endpoint;
        }
        if let Some(ms) = non_empty("XAI_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.timeout = Duration::from_millis(ms.max(1));
        }
        cfg
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn credentials(&self) -> Option<SocialCredentials> {
        self.api_key.as_ref().map(|key| SocialCredentials {
            api_key: key.clone(),
            model: self.model.clone(),
        })
    }

    /// Model label for run records.
    pub fn run_model(&self) -> &str {
        if self.api_key.is_some() {
            &self.model
        } else {
            NO_MODEL
        }
    }
}
