// src/config/collector.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{default_catalog, SourceDescriptor, SourceMode};
use crate::ingest::fetch::MIN_RESPONSE_BYTES;

const ENV_PATH: &str = "COLLECTOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/collector.toml";

pub const DEFAULT_TIMEOUT_MS: u64 = 12_000;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Collector settings. File values are overridden by the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub max_response_bytes: usize,
    /// Empty means every catalog source is allowed.
    pub enabled_source_ids: Vec<String>,
    pub enable_social: bool,
    pub source_mode: SourceMode,
    /// Appended to the built-in catalog; an entry with an existing id replaces it.
    pub extra_sources: Vec<SourceDescriptor>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            concurrency: DEFAULT_CONCURRENCY,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            enabled_source_ids: Vec::new(),
            enable_social: true,
            source_mode: SourceMode::All,
            extra_sources: Vec::new(),
        }
    }
}

impl CollectorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: CollectorConfig = toml::from_str(s).context("parsing collector config")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config through `lookup`:
    /// 1) file at `$COLLECTOR_CONFIG_PATH`
    /// 2) `config/collector.toml`
    /// 3) defaults
    ///
    /// then apply environment overrides.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = if let Some(p) = lookup(ENV_PATH).filter(|p| !p.trim().is_empty()) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides(lookup))
    }

    /// [`Self::load_with`] over the process environment.
    pub fn load_default() -> Result<Self> {
        Self::load_with(|k| std::env::var(k).ok())
    }

    /// `SOURCE_HTTP_TIMEOUT_MS`, `SOURCE_CONCURRENCY`, `SOURCE_MAX_RESPONSE_BYTES`,
    /// `ENABLED_SOURCE_IDS` (comma list), `SOURCE_ENABLE_X` (`0` disables),
    /// `SOURCE_MODE` (`all` or `news_social`).
    /// Unparseable numbers are ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_env::<u64>(&lookup, "SOURCE_HTTP_TIMEOUT_MS") {
            self.timeout_ms = v;
        }
        if let Some(v) = parse_env::<usize>(&lookup, "SOURCE_CONCURRENCY") {
            self.concurrency = v;
        }
        if let Some(v) = parse_env::<usize>(&lookup, "SOURCE_MAX_RESPONSE_BYTES") {
            self.max_response_bytes = v;
        }
        if let Some(ids) = lookup("ENABLED_SOURCE_IDS") {
            self.enabled_source_ids = split_ids(&ids);
        }
        if let Some(flag) = lookup("SOURCE_ENABLE_X") {
            self.enable_social = flag.trim() != "0";
        }
        if let Some(mode) = lookup("SOURCE_MODE") {
            self.source_mode = SourceMode::parse(&mode);
        }
        self.sanitized()
    }

    pub fn sanitized(mut self) -> Self {
        if self.timeout_ms == 0 {
            self.timeout_ms = DEFAULT_TIMEOUT_MS;
        }
        self.concurrency = self.concurrency.max(1);
        self.max_response_bytes = self.max_response_bytes.max(MIN_RESPONSE_BYTES);
        self.enabled_source_ids = clean_list(std::mem::take(&mut self.enabled_source_ids));
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `None` when no allow-list is configured.
    pub fn allow_list(&self) -> Option<HashSet<String>> {
        if self.enabled_source_ids.is_empty() {
            None
        } else {
            Some(self.enabled_source_ids.iter().cloned().collect())
        }
    }

    /// Built-in catalog with configured extras merged in.
    pub fn catalog(&self) -> Vec<SourceDescriptor> {
        let mut catalog = default_catalog();
        for extra in &self.extra_sources {
            match catalog.iter_mut().find(|s| s.id == extra.id) {
                Some(slot) => *slot = extra.clone(),
                None => catalog.push(extra.clone()),
            }
        }
        catalog
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config override");
            None
        }
    }
}

fn split_ids(s: &str) -> Vec<String> {
    s.split(',').map(|x| x.to_string()).collect()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_and_floors() {
        let cfg = CollectorConfig::default().with_env_overrides(env(&[
            ("SOURCE_HTTP_TIMEOUT_MS", "3000"),
            ("SOURCE_CONCURRENCY", "0"),
            ("SOURCE_MAX_RESPONSE_BYTES", "10"),
            ("ENABLED_SOURCE_IDS", " news_hon_jp, ,x_grok_social,news_hon_jp"),
            ("SOURCE_ENABLE_X", "0"),
            ("SOURCE_MODE", " news_social "),
        ]));
        assert_eq!(cfg.timeout_ms, 3000);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.max_response_bytes, MIN_RESPONSE_BYTES);
        assert_eq!(cfg.enabled_source_ids, vec!["news_hon_jp", "x_grok_social"]);
        assert!(!cfg.enable_social);
        assert_eq!(cfg.source_mode, SourceMode::NewsSocial);
    }

    #[test]
    fn garbage_numbers_are_ignored() {
        let cfg =
            CollectorConfig::default().with_env_overrides(env(&[("SOURCE_CONCURRENCY", "many")]));
        assert_eq!(cfg.concurrency, DEFAULT_CONCURRENCY);
        assert!(cfg.allow_list().is_none());
    }

    #[test]
    fn toml_extras_replace_or_append() {
        let cfg = CollectorConfig::from_toml_str(
            r#"
concurrency = 2

[[extra_sources]]
id = "news_hon_jp"
kind = "rss_direct"
name = "HON.jp (override)"
category = "digital"
url = "https://hon.jp/news/feed"

[[extra_sources]]
id = "deals_kinseri"
kind = "kinseri_deals"
name = "キンセリ"
category = "deals"
itemLimit = 20
url = "https://kinseri.example/deals"
"#,
        )
        .unwrap();
        assert_eq!(cfg.concurrency, 2);
        let cat = cfg.catalog();
        let hon = cat.iter().find(|s| s.id == "news_hon_jp").unwrap();
        assert_eq!(hon.name, "HON.jp (override)");
        assert_eq!(hon.priority, 1);
        let deals = cat.last().unwrap();
        assert_eq!(deals.id, "deals_kinseri");
        assert_eq!(deals.item_limit, 20);
        assert_eq!(cat.len(), crate::catalog::default_catalog().len() + 1);
    }
}
