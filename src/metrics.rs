// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time series registration so names show up in the exposition.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collector_sources_total",
            "Sources collected, labelled by outcome status."
        );
        describe_counter!(
            "collector_signals_raw_total",
            "Signals produced by adapters before dedup."
        );
        describe_counter!(
            "collector_signals_kept_total",
            "Signals remaining after dedup."
        );
        describe_counter!(
            "collector_dedup_drop_total",
            "Signals merged away by dedup."
        );
        describe_counter!(
            "collector_page_blocked_total",
            "Page fetches that hit a robot check."
        );
        describe_histogram!(
            "collector_source_ms",
            "Per-source collection time in milliseconds."
        );
        describe_counter!("ingest_events_total", "Feed entries parsed.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!("digest_runs_total", "Digest runs completed.");
        describe_gauge!("digest_last_run_ts", "Unix ts of the last digest run.");
    });
}

/// Install the Prometheus recorder for this process.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    ensure_described();
    Ok(handle)
}
