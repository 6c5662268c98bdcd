//! Error types for the status crate.

use vwc_workdir::WorkdirError;

/// Errors that can occur while computing status.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Reading the live checkout failed, even after a re-read.
    #[error("working directory error: {0}")]
    Workdir(#[from] WorkdirError),

    /// Enumerating the checkout failed.
    #[error("failed to walk the checkout: {0}")]
    Walk(#[source] std::io::Error),
}

/// Convenience alias for status results.
pub type StatusResult<T> = Result<T, StatusError>;
