// src/main.rs
//! Publishing Signal Digest binary entrypoint.
//! Runs one theme end to end and prints the resulting run as JSON.
//!
//! Usage: `signal-digest [name] [query] [period_days] [all|news_social]`

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use publishing_signal_digest::catalog::SourceMode;
use publishing_signal_digest::config::{CollectorConfig, SocialConfig};
use publishing_signal_digest::ingest::fetch::HttpFetcher;
use publishing_signal_digest::ingest::DEFAULT_PERIOD_DAYS;
use publishing_signal_digest::social::client::XaiClient;
use publishing_signal_digest::{metrics, Pipeline, Theme};

const DEFAULT_THEME: &str = "出版業界";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("collector=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // stdout carries the run JSON
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn theme_from_args(args: &[String]) -> Theme {
    let name = args.first().cloned().unwrap_or_else(|| DEFAULT_THEME.to_string());
    let query = args.get(1).cloned().unwrap_or_default();
    let period_days = args
        .get(2)
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PERIOD_DAYS);
    Theme {
        id: "cli".to_string(),
        name,
        query,
        period_days,
        enabled: true,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; missing file is fine.
    dotenvy::dotenv().ok();
    init_tracing();

    let print_metrics = std::env::var("COLLECTOR_PRINT_METRICS").is_ok_and(|v| v == "1");
    let prometheus = if print_metrics {
        Some(metrics::install_prometheus()?)
    } else {
        None
    };

    let config = CollectorConfig::load_default().context("loading collector config")?;
    let social = SocialConfig::from_env();
    let fetcher = Arc::new(HttpFetcher::new()?);
    let social_client = Arc::new(XaiClient::with_endpoint(
        social.endpoint.clone(),
        social.timeout,
    )?);

    let pipeline = Pipeline::new(config, social, fetcher, social_client);
    let args: Vec<String> = std::env::args().skip(1).collect();
    let theme = theme_from_args(&args);
    let mode = args
        .get(3)
        .map(|m| SourceMode::parse(m))
        .unwrap_or_else(|| pipeline.default_mode());
    let run = pipeline.run_theme(&theme, mode).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&run).context("serializing run")?
    );
    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }
    Ok(())
}
