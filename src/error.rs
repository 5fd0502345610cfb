// src/error.rs
use thiserror::Error;

/// Run-level failures a caller may want to tell apart.
#[derive(Debug, Error)]
pub enum RunError {
    /// A run for the same theme is already in flight.
    #[error("a run for theme `{theme_id}` is already in progress")]
    AlreadyRunning { theme_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
