//! Error types for the working directory crate.

use std::io;

use vwc_types::RepoPath;

/// Errors from materialization, live reads and state persistence.
#[derive(Debug, thiserror::Error)]
pub enum WorkdirError {
    /// An OS filesystem call failed for `path`.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: RepoPath,
        #[source]
        source: io::Error,
    },

    /// The on-disk entry is of a type the working copy cannot track
    /// (socket, fifo, device).
    #[error("unsupported file type at {0:?}")]
    Unsupported(RepoPath),

    /// The persisted working state could not be read or written.
    #[error("working state error: {0}")]
    State(String),
}

impl WorkdirError {
    pub fn io(path: &RepoPath, source: io::Error) -> Self {
        Self::Io {
            path: path.clone(),
            source,
        }
    }

    /// Returns `true` for I/O failures worth one more attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the underlying error means the path is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Convenience alias for working directory results.
pub type WorkdirResult<T> = Result<T, WorkdirError>;

/// Why a symlink chain could not be followed to a terminal entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnresolvableReason {
    /// The walk came back to a link it had already followed.
    Cycle { revisited: RepoPath },
    /// More links than the configured hop bound.
    HopLimit { hops: usize },
    /// Absolute target, or `..` past the checkout root.
    EscapesRoot { target: String },
    /// Target text is not valid UTF-8.
    InvalidTarget,
}

impl std::fmt::Display for UnresolvableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { revisited } => write!(f, "symlink cycle through {revisited}"),
            Self::HopLimit { hops } => write!(f, "more than {hops} symlink hops"),
            Self::EscapesRoot { target } => write!(f, "target {target:?} leaves the checkout"),
            Self::InvalidTarget => write!(f, "target is not valid UTF-8"),
        }
    }
}

/// Errors from resolve-for-read operations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no such file or directory: {0:?}")]
    NotFound(RepoPath),

    /// Distinct from `NotFound`: the path exists but its link chain has no
    /// terminal entry.
    #[error("unresolvable symlink {path:?}: {reason}")]
    Unresolvable {
        path: RepoPath,
        reason: UnresolvableReason,
    },

    #[error("not a directory: {0:?}")]
    NotADirectory(RepoPath),

    #[error("is a directory: {0:?}")]
    IsADirectory(RepoPath),

    #[error("not a symlink: {0:?}")]
    NotASymlink(RepoPath),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: RepoPath,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_is_transient() {
        let path = RepoPath::new("a").unwrap();
        let err = WorkdirError::io(&path, io::Error::from(io::ErrorKind::Interrupted));
        assert!(err.is_transient());
        let err = WorkdirError::io(&path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!err.is_transient());
    }

    #[test]
    fn not_found_detection() {
        let path = RepoPath::new("gone").unwrap();
        assert!(WorkdirError::io(&path, io::Error::from(io::ErrorKind::NotFound)).is_not_found());
        assert!(!WorkdirError::Unsupported(path).is_not_found());
    }

    #[test]
    fn unresolvable_message_names_the_cycle() {
        let err = ResolveError::Unresolvable {
            path: RepoPath::new("s0").unwrap(),
            reason: UnresolvableReason::Cycle {
                revisited: RepoPath::new("s0").unwrap(),
            },
        };
        assert!(err.to_string().contains("symlink cycle through s0"));
    }
}
