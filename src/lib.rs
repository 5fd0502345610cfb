// src/lib.rs
// Public library surface; the binary and integration tests build on it.

pub mod catalog;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod run;
pub mod scoring;
pub mod social;

// ---- Re-exports for the common entry points ----
pub use crate::collector::{Collection, Collector, SourceStat};
pub use crate::digest::{DigestPayload, ParseStatus, TrendDigest};
pub use crate::error::RunError;
pub use crate::ingest::types::{Signal, ThemeQuery};
pub use crate::run::{run_all_enabled_themes, Pipeline, Run, RunStore, Theme};
