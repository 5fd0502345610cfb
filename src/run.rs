// src/run.rs
//! One run per theme: collect, dedup, digest, and wrap the result in a
//! [`Run`] record for the caller to persist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};

use crate::catalog::{filter_catalog, SourceDescriptor, SourceMode};
use crate::collector::{Collection, Collector};
use crate::config::{CollectorConfig, SocialConfig};
use crate::dedup::dedupe_signals;
use crate::digest::{build_trend_payload, period_label, DigestPayload, ParseStatus, TrendDigest};
use crate::error::RunError;
use crate::ingest::fetch::PageFetcher;
use crate::ingest::providers::AdapterRegistry;
use crate::ingest::types::{RunContext, ThemeQuery};
use crate::ingest::{create_id, jst, since_date, DEFAULT_PERIOD_DAYS};
use crate::social::client::SocialSearchClient;

/// A stored topic the digest runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_period_days")]
    pub period_days: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_period_days() -> u32 {
    DEFAULT_PERIOD_DAYS
}

fn default_enabled() -> bool {
    true
}

impl Theme {
    pub fn query(&self) -> ThemeQuery {
        ThemeQuery {
            name: self.name.clone(),
            query: self.query.clone(),
            period_days: self.period_days.max(1),
        }
    }
}

/// One completed run, as handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub theme_id: String,
    pub theme_name: String,
    pub query: String,
    pub period_days: u32,
    pub period_label: String,
    pub model: String,
    pub query_with_since: String,
    pub since_date: NaiveDate,
    pub run_date_jst: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub parse_status: ParseStatus,
    pub payload: DigestPayload,
    pub raw_text: String,
}

/// Persistence boundary for runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn append_run(&self, run: &Run) -> Result<()>;
}

/// In-memory store for tests and one-shot use.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<Run>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<Run> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn append_run(&self, run: &Run) -> Result<()> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(run.clone());
        Ok(())
    }
}

/// Theme ids with a run in flight, and when each started.
#[derive(Debug, Default)]
pub struct RunRegistry {
    inner: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// Releases the theme's slot on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a RunRegistry,
    theme_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.theme_id);
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `theme_id`, failing fast when a run already holds it.
    pub fn try_begin(&self, theme_id: &str) -> Result<InFlightGuard<'_>, RunError> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(theme_id) {
            return Err(RunError::AlreadyRunning {
                theme_id: theme_id.to_string(),
            });
        }
        map.insert(theme_id.to_string(), Utc::now());
        Ok(InFlightGuard {
            registry: self,
            theme_id: theme_id.to_string(),
        })
    }

    pub fn is_running(&self, theme_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(theme_id)
    }
}

/// Wires the catalog, adapters and collaborators for repeated runs.
pub struct Pipeline {
    catalog: Vec<SourceDescriptor>,
    config: CollectorConfig,
    social: SocialConfig,
    fetcher: Arc<dyn PageFetcher>,
    social_client: Arc<dyn SocialSearchClient>,
    collector: Collector,
    in_flight: RunRegistry,
}

impl Pipeline {
    pub fn new(
        config: CollectorConfig,
        social: SocialConfig,
        fetcher: Arc<dyn PageFetcher>,
        social_client: Arc<dyn SocialSearchClient>,
    ) -> Self {
        let config = config.sanitized();
        Self {
            catalog: config.catalog(),
            collector: Collector::new(AdapterRegistry::standard(), config.concurrency),
            config,
            social,
            fetcher,
            social_client,
            in_flight: RunRegistry::new(),
        }
    }

    /// Replace the catalog (configured extras are not re-applied).
    pub fn with_catalog(mut self, catalog: Vec<SourceDescriptor>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_adapters(mut self, registry: AdapterRegistry) -> Self {
        self.collector = Collector::new(registry, self.config.concurrency);
        self
    }

    pub fn in_flight(&self) -> &RunRegistry {
        &self.in_flight
    }

    /// Source mode from configuration, for callers without a per-run choice.
    pub fn default_mode(&self) -> SourceMode {
        self.config.source_mode
    }

    pub fn eligible_sources(&self, mode: SourceMode) -> Vec<SourceDescriptor> {
        let allow = self.config.allow_list();
        filter_catalog(&self.catalog, mode, self.config.enable_social, allow.as_ref())
    }

    fn context(&self, theme: &ThemeQuery, now: DateTime<Utc>) -> RunContext {
        RunContext {
            theme: theme.clone(),
            since_date: since_date(theme.period_days, now),
            now,
            timeout: self.config.timeout(),
            max_response_bytes: self.config.max_response_bytes,
            social: self.social.credentials(),
            fetcher: Arc::clone(&self.fetcher),
            social_client: Arc::clone(&self.social_client),
        }
    }

    /// Collect every source `mode` admits for `theme`; never fails.
    pub async fn collect_theme(
        &self,
        theme: &ThemeQuery,
        mode: SourceMode,
        now: DateTime<Utc>,
    ) -> Collection {
        let sources = self.eligible_sources(mode);
        let ctx = self.context(theme, now);
        self.collector.collect(&sources, &ctx).await
    }

    pub async fn digest_theme(
        &self,
        theme: &ThemeQuery,
        mode: SourceMode,
        now: DateTime<Utc>,
    ) -> TrendDigest {
        let collection = self.collect_theme(theme, mode, now).await;
        let deduped = dedupe_signals(collection.signals.clone());
        let digest = build_trend_payload(theme, &collection, deduped, now);

        let coverage = &digest.payload.coverage;
        tracing::info!(
            target: "collector",
            theme = %theme.name,
            mode = ?mode,
            sources = coverage.source_total,
            ok = coverage.source_ok,
            errors = coverage.source_error,
            raw = coverage.before_dedupe,
            kept = coverage.signals,
            dropped = coverage.duplicate_drop,
            "collection finished"
        );
        digest
    }

    pub async fn run_theme(&self, theme: &Theme, mode: SourceMode) -> Result<Run, RunError> {
        self.run_theme_at(theme, mode, Utc::now()).await
    }

    /// Run `theme` as of `now`. A second call for the same theme id while
    /// one is in flight fails with [`RunError::AlreadyRunning`].
    pub async fn run_theme_at(
        &self,
        theme: &Theme,
        mode: SourceMode,
        now: DateTime<Utc>,
    ) -> Result<Run, RunError> {
        let _guard = self.in_flight.try_begin(&theme.id)?;
        let query = theme.query();
        let digest = self.digest_theme(&query, mode, now).await;

        counter!("digest_runs_total", "status" => digest.parse_status.as_str()).increment(1);
        gauge!("digest_last_run_ts").set(now.timestamp() as f64);

        Ok(Run {
            id: create_id("run"),
            theme_id: theme.id.clone(),
            theme_name: theme.name.clone(),
            query: theme.query.clone(),
            period_days: query.period_days,
            period_label: period_label(query.period_days),
            model: self.social.run_model().to_string(),
            query_with_since: digest.query_with_since,
            since_date: since_date(query.period_days, now),
            run_date_jst: now.with_timezone(&jst()).date_naive(),
            created_at: now,
            parse_status: digest.parse_status,
            payload: digest.payload,
            raw_text: digest.raw_text,
        })
    }

    /// Run and persist.
    pub async fn run_and_store(
        &self,
        theme: &Theme,
        mode: SourceMode,
        store: &dyn RunStore,
    ) -> Result<Run, RunError> {
        let run = self.run_theme(theme, mode).await?;
        store.append_run(&run).await?;
        Ok(run)
    }
}

/// Per-theme outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRunResult {
    pub theme_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<Run>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run every enabled theme in order. A failing theme is recorded and the
/// batch moves on.
pub async fn run_all_enabled_themes(
    pipeline: &Pipeline,
    themes: &[Theme],
    mode: SourceMode,
    store: &dyn RunStore,
) -> Vec<ThemeRunResult> {
    let mut results = Vec::new();
    for theme in themes.iter().filter(|t| t.enabled) {
        let result = match pipeline.run_and_store(theme, mode, store).await {
            Ok(run) => ThemeRunResult {
                theme_id: theme.id.clone(),
                ok: true,
                run: Some(run),
                error: None,
            },
            Err(e) => {
                tracing::warn!(target: "collector", theme_id = %theme.id, error = %e, "theme run failed");
                ThemeRunResult {
                    theme_id: theme.id.clone(),
                    ok: false,
                    run: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_second_claim_until_released() {
        let reg = RunRegistry::new();
        let guard = reg.try_begin("t1").unwrap();
        assert!(reg.is_running("t1"));
        assert!(matches!(
            reg.try_begin("t1"),
            Err(RunError::AlreadyRunning { theme_id }) if theme_id == "t1"
        ));
        assert!(reg.try_begin("t2").is_ok());
        drop(guard);
        assert!(!reg.is_running("t1"));
        assert!(reg.try_begin("t1").is_ok());
    }

    #[test]
    fn theme_defaults_from_json() {
        let t: Theme = serde_json::from_str(r#"{"id":"a","name":"出版"}"#).unwrap();
        assert_eq!(t.period_days, DEFAULT_PERIOD_DAYS);
        assert!(t.enabled);
        assert_eq!(t.query().search_text(), "出版");
    }
}
