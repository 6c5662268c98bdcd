//! Conflict handling for updates.
//!
//! A conflict arises when a path carries a local change and the update
//! brings a different change to the same path. What happens then is up to
//! a [`ConflictPolicy`]. The default, [`ReportConflicts`], keeps the local
//! state and reports the path; [`PreferIncoming`] overwrites it.

use std::fmt;

use vwc_status::LocalState;
use vwc_store::Entry;
use vwc_types::RepoPath;

/// Decision for one conflicted path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    TakeIncoming,
}

/// Everything a policy may look at for one conflicted path.
#[derive(Debug)]
pub struct ConflictContext<'a> {
    pub path: &'a RepoPath,
    /// Entry in the commit being left, if the path was tracked there.
    pub base: Option<&'a Entry>,
    /// Entry in the target commit, or `None` when the update removes it.
    pub incoming: Option<&'a Entry>,
    pub local: &'a LocalState,
}

impl ConflictContext<'_> {
    /// Both sides changed the entry's kind, to different kinds.
    pub fn is_kind_clash(&self) -> bool {
        match (self.base, self.incoming, self.local.live()) {
            (Some(base), Some(incoming), Some(live)) => {
                base.kind != incoming.kind && base.kind != live.kind && incoming.kind != live.kind
            }
            _ => false,
        }
    }
}

pub trait ConflictPolicy: Send + Sync {
    fn resolve(&self, ctx: &ConflictContext<'_>) -> Resolution;
}

/// Keep local changes and report the path as conflicted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReportConflicts;

impl ConflictPolicy for ReportConflicts {
    fn resolve(&self, _ctx: &ConflictContext<'_>) -> Resolution {
        Resolution::KeepLocal
    }
}

/// Discard local changes in favour of the incoming entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreferIncoming;

impl ConflictPolicy for PreferIncoming {
    fn resolve(&self, _ctx: &ConflictContext<'_>) -> Resolution {
        Resolution::TakeIncoming
    }
}

/// Why a path was left untouched by an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    /// Locally modified, and the update changes or removes it.
    LocallyModified,
    /// Locally deleted, and the update changes it.
    LocallyMissing,
    /// An untracked entry sits where the update adds one.
    UntrackedInTheWay,
    /// Materialization failed, even after retrying.
    Io(String),
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocallyModified => write!(f, "local changes would be overwritten"),
            Self::LocallyMissing => write!(f, "locally deleted but changed in target"),
            Self::UntrackedInTheWay => write!(f, "untracked entry differs from incoming"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

/// A path an update could not apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub path: RepoPath,
    pub reason: ConflictReason,
}

impl Conflict {
    pub fn new(path: RepoPath, reason: ConflictReason) -> Self {
        Self { path, reason }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    #[test]
    fn kind_clash_needs_three_distinct_kinds() {
        let base = Entry::file(p("x"), "t");
        let incoming = Entry::symlink(p("x"), "t");
        let local = LocalState::Modified(Entry::executable(p("x"), "t"));
        let ctx = ConflictContext {
            path: &base.path,
            base: Some(&base),
            incoming: Some(&incoming),
            local: &local,
        };
        assert!(ctx.is_kind_clash());

        let local = LocalState::Modified(Entry::file(p("x"), "changed"));
        let ctx = ConflictContext { local: &local, ..ctx };
        assert!(!ctx.is_kind_clash());
    }

    #[test]
    fn builtin_policies() {
        let local = LocalState::Missing;
        let path = p("x");
        let ctx = ConflictContext {
            path: &path,
            base: None,
            incoming: None,
            local: &local,
        };
        assert_eq!(ReportConflicts.resolve(&ctx), Resolution::KeepLocal);
        assert_eq!(PreferIncoming.resolve(&ctx), Resolution::TakeIncoming);
    }

    #[test]
    fn conflict_display() {
        let c = Conflict::new(p("symlink"), ConflictReason::LocallyModified);
        assert_eq!(c.to_string(), "symlink: local changes would be overwritten");
    }
}
