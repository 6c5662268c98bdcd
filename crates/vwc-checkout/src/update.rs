//! Commit-to-commit updates of the live checkout.
//!
//! An update compares the snapshot being left with the target snapshot,
//! then walks the affected paths in lexicographic order. Each path is
//! handled on its own: a failure or conflict at one path never aborts the
//! others, and the run always ends back in [`Phase::Idle`].

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vwc_status::{LocalState, StatusEngine};
use vwc_store::{Entry, Snapshot};
use vwc_types::{EntryKind, RepoPath};
use vwc_workdir::{
    FileSystem, MaterializedEntry, MaterializedForm, Materializer, SymlinkPolicy, WorkdirResult,
    WorkingState,
};

use crate::conflict::{Conflict, ConflictContext, ConflictPolicy, ConflictReason, Resolution};

/// Lifecycle of a working copy with respect to updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Updating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Updating => write!(f, "updating"),
        }
    }
}

/// What an update does at one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathChange {
    Add(Entry),
    Remove(Entry),
    /// Content or kind differs. A kind change with identical bytes is
    /// still a modification.
    Modify { from: Entry, to: Entry },
    Unchanged(Entry),
}

impl PathChange {
    pub fn path(&self) -> &RepoPath {
        match self {
            Self::Add(e) | Self::Remove(e) | Self::Unchanged(e) => &e.path,
            Self::Modify { to, .. } => &to.path,
        }
    }

    /// Entry in the snapshot being left.
    pub fn base(&self) -> Option<&Entry> {
        match self {
            Self::Remove(e) | Self::Unchanged(e) => Some(e),
            Self::Modify { from, .. } => Some(from),
            Self::Add(_) => None,
        }
    }

    /// Entry in the target snapshot.
    pub fn incoming(&self) -> Option<&Entry> {
        match self {
            Self::Add(e) | Self::Unchanged(e) => Some(e),
            Self::Modify { to, .. } => Some(to),
            Self::Remove(_) => None,
        }
    }

    fn is_directory_removal(&self) -> bool {
        matches!(self, Self::Remove(e) if e.kind == EntryKind::Directory)
    }

    /// Puts a non-directory where `from` tracks paths below.
    fn replaces_directory(&self, from: &Snapshot) -> bool {
        match self {
            Self::Add(e) | Self::Modify { to: e, .. } => {
                e.kind != EntryKind::Directory && from.has_descendants(&e.path)
            }
            _ => false,
        }
    }
}

/// Classify every path of `from` and `to`, in lexicographic order.
pub fn plan_update(from: &Snapshot, to: &Snapshot) -> Vec<PathChange> {
    let paths: BTreeSet<&RepoPath> = from.paths().chain(to.paths()).collect();
    paths
        .into_iter()
        .filter_map(|path| match (from.get(path), to.get(path)) {
            (None, Some(new)) => Some(PathChange::Add(new.clone())),
            (Some(old), None) => Some(PathChange::Remove(old.clone())),
            (Some(old), Some(new)) if old.same_identity(new) => {
                Some(PathChange::Unchanged(new.clone()))
            }
            (Some(old), Some(new)) => Some(PathChange::Modify {
                from: old.clone(),
                to: new.clone(),
            }),
            (None, None) => None,
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// Discard local changes instead of reporting conflicts.
    pub clean: bool,
    /// Checked between paths; once set, the run stops.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl UpdateOptions {
    pub fn clean() -> Self {
        Self {
            clean: true,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Outcome of one update run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Paths written, removed or adopted, in processing order.
    pub applied: Vec<RepoPath>,
    pub conflicts: Vec<Conflict>,
    /// The run stopped early; the checkout mixes old and new entries.
    pub cancelled: bool,
}

impl UpdateResult {
    /// No conflicts and not cancelled.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.conflicts.is_empty()
    }

    pub fn is_conflicted(&self, path: &RepoPath) -> bool {
        self.conflicts.iter().any(|c| &c.path == path)
    }
}

enum Step {
    Applied,
    Untouched,
    Conflicted(ConflictReason),
}

/// Applies snapshot transitions to the live checkout.
pub struct UpdateEngine<'a> {
    fs: &'a dyn FileSystem,
    policy: SymlinkPolicy,
    conflict_policy: &'a dyn ConflictPolicy,
    retries: usize,
}

impl<'a> UpdateEngine<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        policy: SymlinkPolicy,
        conflict_policy: &'a dyn ConflictPolicy,
    ) -> Self {
        Self {
            fs,
            policy,
            conflict_policy,
            retries: 1,
        }
    }

    /// Extra attempts for a transient I/O failure.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Move the checkout from `from` to `to`, recording every write in
    /// `state`. Does not touch the state's parent.
    pub fn apply(
        &self,
        from: &Snapshot,
        to: &Snapshot,
        state: &mut WorkingState,
        options: &UpdateOptions,
    ) -> UpdateResult {
        let changes = plan_update(from, to);
        let mut result = UpdateResult::default();
        let mut done: HashSet<&RepoPath> = HashSet::new();
        let mut directory_removals = Vec::new();

        info!(
            paths = changes.len(),
            clean = options.clean,
            policy = ?self.policy,
            "starting update"
        );

        for change in &changes {
            if options.is_cancelled() {
                result.cancelled = true;
                break;
            }
            if done.contains(change.path()) {
                continue;
            }
            // Directories go after their contents.
            if change.is_directory_removal() {
                directory_removals.push(change);
                continue;
            }
            if change.replaces_directory(from) {
                let below: Vec<&PathChange> = changes
                    .iter()
                    .filter(|c| matches!(c, PathChange::Remove(_)))
                    .filter(|c| c.path() != change.path() && c.path().starts_with(change.path()))
                    .collect();
                for sub in below.into_iter().rev() {
                    if done.insert(sub.path()) {
                        let step = self.step(sub, state, options.clean);
                        Self::record(sub.path(), step, &mut result);
                    }
                }
            }
            let step = self.step(change, state, options.clean);
            Self::record(change.path(), step, &mut result);
        }

        if !result.cancelled {
            for change in directory_removals.into_iter().rev() {
                if done.insert(change.path()) {
                    let step = self.step(change, state, options.clean);
                    Self::record(change.path(), step, &mut result);
                }
            }
            self.restore_pruned_directories(to, state, &result);
        } else {
            warn!(applied = result.applied.len(), "update cancelled");
        }

        info!(
            applied = result.applied.len(),
            conflicts = result.conflicts.len(),
            cancelled = result.cancelled,
            "update finished"
        );
        result
    }

    fn record(path: &RepoPath, step: Step, result: &mut UpdateResult) {
        match step {
            Step::Applied => result.applied.push(path.clone()),
            Step::Untouched => {}
            Step::Conflicted(reason) => {
                warn!(path = %path, reason = %reason, "path left in conflict");
                result.conflicts.push(Conflict::new(path.clone(), reason));
            }
        }
    }

    fn step(&self, change: &PathChange, state: &mut WorkingState, clean: bool) -> Step {
        let path = change.path();
        match change {
            PathChange::Unchanged(entry) => {
                if !clean {
                    return Step::Untouched;
                }
                match self.local_state(path, Some(entry), state) {
                    Ok(LocalState::Clean) => Step::Untouched,
                    _ => self.realize(entry, state),
                }
            }
            PathChange::Add(incoming) => {
                if clean {
                    return self.realize(incoming, state);
                }
                match self.local_state(path, Some(incoming), state) {
                    Err(reason) => Step::Conflicted(reason),
                    Ok(LocalState::Clean) => self.adopt(incoming, state),
                    Ok(LocalState::Missing | LocalState::Absent) => self.realize(incoming, state),
                    Ok(LocalState::Modified(live) | LocalState::Untracked(live)) => {
                        let local = LocalState::Untracked(live);
                        match self.arbitrate(change, &local, ConflictReason::UntrackedInTheWay) {
                            Some(reason) => Step::Conflicted(reason),
                            None => self.realize(incoming, state),
                        }
                    }
                }
            }
            PathChange::Remove(base) => {
                if clean {
                    return self.remove(path, state);
                }
                match self.local_state(path, Some(base), state) {
                    Err(reason) => Step::Conflicted(reason),
                    Ok(LocalState::Clean) => self.remove(path, state),
                    Ok(LocalState::Missing | LocalState::Absent) => {
                        state.forget(path);
                        Step::Applied
                    }
                    Ok(local) => match self.arbitrate(change, &local, ConflictReason::LocallyModified) {
                        Some(reason) => {
                            // Kept on disk, but no longer tracked.
                            state.forget(path);
                            Step::Conflicted(reason)
                        }
                        None => self.remove(path, state),
                    },
                }
            }
            PathChange::Modify { from, to } => {
                if clean {
                    return self.realize(to, state);
                }
                match self.local_state(path, Some(from), state) {
                    Err(reason) => Step::Conflicted(reason),
                    Ok(LocalState::Clean) => self.realize(to, state),
                    Ok(LocalState::Modified(live)) if live.same_identity(to) => {
                        self.adopt(to, state)
                    }
                    Ok(local) => {
                        let reason = match local {
                            LocalState::Missing | LocalState::Absent => {
                                ConflictReason::LocallyMissing
                            }
                            _ => ConflictReason::LocallyModified,
                        };
                        match self.arbitrate(change, &local, reason) {
                            Some(reason) => Step::Conflicted(reason),
                            None => self.realize(to, state),
                        }
                    }
                }
            }
        }
    }

    fn local_state(
        &self,
        path: &RepoPath,
        expected: Option<&Entry>,
        state: &WorkingState,
    ) -> Result<LocalState, ConflictReason> {
        StatusEngine::new(self.fs, self.policy)
            .path_status(path, expected, state)
            .map_err(|e| ConflictReason::Io(e.to_string()))
    }

    /// `None` means take the incoming change.
    fn arbitrate(
        &self,
        change: &PathChange,
        local: &LocalState,
        reason: ConflictReason,
    ) -> Option<ConflictReason> {
        let ctx = ConflictContext {
            path: change.path(),
            base: change.base(),
            incoming: change.incoming(),
            local,
        };
        match self.conflict_policy.resolve(&ctx) {
            Resolution::KeepLocal => Some(reason),
            Resolution::TakeIncoming => {
                debug!(path = %change.path(), kind_clash = ctx.is_kind_clash(), "overwriting local change");
                None
            }
        }
    }

    fn realize(&self, entry: &Entry, state: &mut WorkingState) -> Step {
        let materializer = Materializer::new(self.fs, self.policy);
        match self.with_retry(&entry.path, || materializer.realize(entry)) {
            Ok(record) => {
                state.record(entry.path.clone(), record);
                Step::Applied
            }
            Err(e) => Step::Conflicted(ConflictReason::Io(e.to_string())),
        }
    }

    fn remove(&self, path: &RepoPath, state: &mut WorkingState) -> Step {
        let materializer = Materializer::new(self.fs, self.policy);
        match self.with_retry(path, || materializer.remove(path)) {
            Ok(_) => {
                state.forget(path);
                Step::Applied
            }
            Err(e) => Step::Conflicted(ConflictReason::Io(e.to_string())),
        }
    }

    /// Record an entry that is already on disk as incoming, without
    /// rewriting it.
    fn adopt(&self, entry: &Entry, state: &mut WorkingState) -> Step {
        let form = match self.fs.stat_entry(&entry.path) {
            Ok(Some(stat)) => MaterializedForm::observed(stat.kind, entry.kind),
            _ => MaterializedForm::for_kind(entry.kind, self.policy),
        };
        state.record(
            entry.path.clone(),
            MaterializedEntry {
                form,
                recorded: entry.kind,
                hash: entry.hash,
            },
        );
        debug!(path = %entry.path, ?form, "adopted matching local entry");
        Step::Applied
    }

    fn with_retry<T>(
        &self,
        path: &RepoPath,
        mut op: impl FnMut() -> WorkdirResult<T>,
    ) -> WorkdirResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(path = %path, attempt, error = %e, "retrying after transient error");
                }
                other => return other,
            }
        }
    }

    /// Removing a file prunes parents left empty, which can take out a
    /// directory the target still tracks.
    fn restore_pruned_directories(
        &self,
        to: &Snapshot,
        state: &mut WorkingState,
        result: &UpdateResult,
    ) {
        for entry in to.entries().filter(|e| e.kind == EntryKind::Directory) {
            if result.is_conflicted(&entry.path) {
                continue;
            }
            if matches!(self.fs.stat_entry(&entry.path), Ok(None)) {
                if let Step::Conflicted(reason) = self.realize(entry, state) {
                    warn!(path = %entry.path, reason = %reason, "could not recreate directory");
                }
            }
        }
    }
}
