//! Snapshot-level diff: compare two snapshots path by path.
//!
//! Renames are never guessed from content. They come from recorded
//! provenance (a commit's renames, or the staging area's), and a rename is
//! only reported when its source left and its destination appeared.

use std::collections::BTreeSet;

use tracing::debug;
use vwc_store::{BackingStore, Entry, Rename, Snapshot};
use vwc_types::{CommitId, EntryKind, RepoPath};

use crate::error::DiffResult;

/// The changes between two snapshots, ordered by path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub changes: Vec<SnapshotChange>,
}

impl SnapshotDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// A single path-level change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotChange {
    Added { entry: Entry },
    Deleted { entry: Entry },
    /// Content changed. The kind may have changed too.
    Modified { old: Entry, new: Entry },
    /// Same content, different kind.
    ModeChanged { old: Entry, new: Entry },
    /// Moved by recorded provenance; content and kind may also differ.
    Renamed { old: Entry, new: Entry },
}

impl SnapshotChange {
    /// Path on the old side (`a/`).
    pub fn old_path(&self) -> &RepoPath {
        match self {
            Self::Added { entry } | Self::Deleted { entry } => &entry.path,
            Self::Modified { old, .. } | Self::ModeChanged { old, .. } | Self::Renamed { old, .. } => {
                &old.path
            }
        }
    }

    /// Path on the new side (`b/`).
    pub fn new_path(&self) -> &RepoPath {
        match self {
            Self::Added { entry } | Self::Deleted { entry } => &entry.path,
            Self::Modified { new, .. } | Self::ModeChanged { new, .. } | Self::Renamed { new, .. } => {
                &new.path
            }
        }
    }
}

/// Compare `old` and `new`, pairing up the given renames.
///
/// Directory entries carry no content and are left out.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot, renames: &[Rename]) -> SnapshotDiff {
    let mut changes = Vec::new();
    let mut renamed_from = BTreeSet::new();
    let mut renamed_to = BTreeSet::new();

    for rename in renames {
        let (Some(from), Some(to)) = (old.get(&rename.from), new.get(&rename.to)) else {
            continue;
        };
        if new.contains(&rename.from) || old.contains(&rename.to) {
            continue;
        }
        if is_directory(from) || is_directory(to) {
            continue;
        }
        if !renamed_from.insert(rename.from.clone()) || !renamed_to.insert(rename.to.clone()) {
            continue;
        }
        changes.push(SnapshotChange::Renamed {
            old: from.clone(),
            new: to.clone(),
        });
    }

    for (path, old_entry) in old.iter() {
        if is_directory(old_entry) || renamed_from.contains(path) {
            continue;
        }
        match new.get(path) {
            Some(new_entry) if is_directory(new_entry) => changes.push(SnapshotChange::Deleted {
                entry: old_entry.clone(),
            }),
            Some(new_entry) if old_entry.hash != new_entry.hash => {
                changes.push(SnapshotChange::Modified {
                    old: old_entry.clone(),
                    new: new_entry.clone(),
                })
            }
            Some(new_entry) if old_entry.kind != new_entry.kind => {
                changes.push(SnapshotChange::ModeChanged {
                    old: old_entry.clone(),
                    new: new_entry.clone(),
                })
            }
            Some(_) => {}
            None => changes.push(SnapshotChange::Deleted {
                entry: old_entry.clone(),
            }),
        }
    }

    for (path, new_entry) in new.iter() {
        if is_directory(new_entry) || renamed_to.contains(path) {
            continue;
        }
        let had_file = old.get(path).is_some_and(|e| !is_directory(e));
        if !had_file {
            changes.push(SnapshotChange::Added {
                entry: new_entry.clone(),
            });
        }
    }

    changes.sort_by(|a, b| {
        a.new_path()
            .cmp(b.new_path())
            .then_with(|| change_rank(a).cmp(&change_rank(b)))
    });
    SnapshotDiff { changes }
}

/// The changes a commit made on top of its parent, with its recorded
/// renames.
pub fn diff_commit(store: &dyn BackingStore, commit: &CommitId) -> DiffResult<SnapshotDiff> {
    let info = store.commit_info(commit)?;
    let old = store.snapshot_or_empty(info.parent.as_ref())?;
    let new = store.get_snapshot(commit)?;
    let diff = diff_snapshots(&old, &new, &info.renames);
    debug!(commit = %commit.short_hex(), changes = diff.len(), "diffed commit");
    Ok(diff)
}

fn is_directory(entry: &Entry) -> bool {
    entry.kind == EntryKind::Directory
}

/// Deletions sort before additions at the same path.
fn change_rank(change: &SnapshotChange) -> u8 {
    match change {
        SnapshotChange::Deleted { .. } => 0,
        _ => 1,
    }
}
