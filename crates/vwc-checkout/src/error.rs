//! Error types for the checkout crate.

use std::path::PathBuf;

use vwc_types::RepoPath;

/// Errors that can occur during working copy operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("store error: {0}")]
    Store(#[from] vwc_store::StoreError),

    #[error("working directory error: {0}")]
    Workdir(#[from] vwc_workdir::WorkdirError),

    #[error(transparent)]
    Resolve(#[from] vwc_workdir::ResolveError),

    #[error("status error: {0}")]
    Status(#[from] vwc_status::StatusError),

    #[error("diff error: {0}")]
    Diff(#[from] vwc_diff::DiffError),

    /// A file under the checkout root, outside any tracked path, could not
    /// be read or written.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkout configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("path is not tracked: {0}")]
    NotTracked(RepoPath),

    #[error("path is already tracked: {0}")]
    AlreadyTracked(RepoPath),

    #[error("no such file or directory: {0}")]
    PathNotFound(RepoPath),

    #[error("destination already exists: {0}")]
    DestinationExists(RepoPath),

    #[error("nothing changed")]
    NothingToCommit,
}

/// Convenience alias for checkout results.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
