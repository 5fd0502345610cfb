// src/collector.rs
//! Bounded-concurrency collection over a filtered catalog.
//!
//! A fixed pool of workers claims catalog indexes from a shared atomic
//! counter and writes each outcome into the slot it claimed, so results come
//! back in catalog order whatever the completion order. Every adapter call is
//! wrapped into a [`SourceOutcome`]; a failing source never aborts the batch.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::anyhow;
use chrono::NaiveDate;
use futures::future::join_all;
use futures::FutureExt;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::catalog::{CostTier, SourceCategory, SourceDescriptor, SourceKind};
use crate::ingest::providers::AdapterRegistry;
use crate::ingest::types::{AdapterOutput, RunContext, Signal, SocialMeta, SourceStatus};

/// Run `f` over `items` with at most `concurrency` calls in flight. The
/// output is index-aligned with `items`.
pub async fn map_with_concurrency<'a, T, R, F, Fut>(
    items: &'a [T],
    concurrency: usize,
    f: F,
) -> Vec<R>
where
    F: Fn(usize, &'a T) -> Fut,
    Fut: Future<Output = R>,
{
    if items.is_empty() {
        return Vec::new();
    }
    let limit = concurrency.clamp(1, items.len());
    let next = AtomicUsize::new(0);

    let workers = (0..limit).map(|_| {
        let next = &next;
        let f = &f;
        async move {
            let mut done = Vec::new();
            loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= items.len() {
                    break;
                }
                done.push((idx, f(idx, &items[idx]).await));
            }
            done
        }
    });

    let mut slots: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    for (idx, result) in join_all(workers).await.into_iter().flatten() {
        slots[idx] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// What one source produced in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: SourceDescriptor,
    pub status: SourceStatus,
    pub items: Vec<Signal>,
    pub social: Option<SocialMeta>,
    /// Error or skip reason; empty when ok.
    pub reason: String,
    pub duration_ms: u64,
}

impl SourceOutcome {
    pub fn stat(&self) -> SourceStat {
        SourceStat {
            source_id: self.source.id.clone(),
            source_name: self.source.name.clone(),
            category: self.source.category,
            status: self.status,
            cost_tier: self.source.cost_tier,
            count: self.items.len(),
            duration_ms: self.duration_ms,
            error: self.reason.clone(),
        }
    }
}

/// Per-source row of the digest's source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStat {
    pub source_id: String,
    pub source_name: String,
    pub category: SourceCategory,
    pub status: SourceStatus,
    pub cost_tier: CostTier,
    pub count: usize,
    pub duration_ms: u64,
    pub error: String,
}

/// Everything one collection pass produced, before dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub since_date: NaiveDate,
    pub source_stats: Vec<SourceStat>,
    /// Catalog order, then within-source order.
    pub signals: Vec<Signal>,
    /// Diagnostics from the social source when it ran.
    pub social_meta: Option<SocialMeta>,
}

impl Collection {
    pub fn total_signals_before_dedupe(&self) -> usize {
        self.signals.len()
    }
}

pub struct Collector {
    registry: AdapterRegistry,
    concurrency: usize,
}

impl Collector {
    pub fn new(registry: AdapterRegistry, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency: concurrency.max(1),
        }
    }

    /// Collect one source; always resolves.
    pub async fn collect_single(&self, source: &SourceDescriptor, ctx: &RunContext) -> SourceOutcome {
        let t0 = Instant::now();
        let result = match self.registry.get(source.kind) {
            // a panicking adapter is this source's failure, not the batch's
            Some(adapter) => AssertUnwindSafe(adapter.collect(source, ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(anyhow!("adapter panicked: {}", panic_message(&*panic)))),
            None => Ok(AdapterOutput::Skipped {
                reason: format!("unsupported source kind: {}", source.kind.as_str()),
            }),
        };
        let duration_ms = t0.elapsed().as_millis() as u64;

        let (status, items, social, reason) = match result {
            Ok(output) => {
                let status = output.status();
                match output {
                    AdapterOutput::Items(items) => (status, items, None, String::new()),
                    AdapterOutput::Social { items, meta } => (status, items, Some(meta), String::new()),
                    AdapterOutput::Skipped { reason } => (status, Vec::new(), None, reason),
                }
            }
            Err(e) => (SourceStatus::Error, Vec::new(), None, format!("{e:#}")),
        };

        histogram!("collector_source_ms").record(duration_ms as f64);
        counter!("collector_sources_total", "status" => status.as_str()).increment(1);
        match status {
            SourceStatus::Error => tracing::warn!(
                target: "collector",
                source_id = %source.id,
                error = %reason,
                duration_ms,
                "source failed"
            ),
            _ => tracing::debug!(
                target: "collector",
                source_id = %source.id,
                status = status.as_str(),
                count = items.len(),
                duration_ms,
                "source collected"
            ),
        }

        SourceOutcome {
            source: source.clone(),
            status,
            items,
            social,
            reason,
            duration_ms,
        }
    }

    /// Collect every source in `sources` under the concurrency cap.
    pub async fn collect(&self, sources: &[SourceDescriptor], ctx: &RunContext) -> Collection {
        crate::metrics::ensure_described();

        let outcomes =
            map_with_concurrency(sources, self.concurrency, |_, s| self.collect_single(s, ctx)).await;

        let source_stats = outcomes.iter().map(SourceOutcome::stat).collect();
        let social_meta = outcomes
            .iter()
            .find(|o| o.source.kind == SourceKind::XGrok)
            .and_then(|o| o.social.clone());
        let signals: Vec<Signal> = outcomes.into_iter().flat_map(|o| o.items).collect();
        counter!("collector_signals_raw_total").increment(signals.len() as u64);

        Collection {
            since_date: ctx.since_date,
            source_stats,
            signals,
            social_meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn map_keeps_input_order() {
        let delays = [30u64, 0, 10, 0, 5];
        let out = map_with_concurrency(&delays, 3, |i, d| {
            let d = *d;
            async move {
                tokio::time::sleep(Duration::from_millis(d)).await;
                i * 10
            }
        })
        .await;
        assert_eq!(out, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn map_on_empty_input() {
        let out: Vec<u8> = map_with_concurrency(&[] as &[u8], 4, |_, x| {
            let x = *x;
            async move { x }
        })
        .await;
        assert!(out.is_empty());
    }
}
