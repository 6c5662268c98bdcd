//! Commit snapshots and the deltas that produce new ones.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vwc_types::{CommitId, RepoPath};

use crate::entry::Entry;

/// Immutable, ordered mapping of path to [`Entry`] for one commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    commit: Option<CommitId>,
    entries: BTreeMap<RepoPath, Entry>,
}

impl Snapshot {
    /// Build a snapshot. Later entries win when a path repeats.
    pub fn new(commit: Option<CommitId>, entries: impl IntoIterator<Item = Entry>) -> Self {
        Self {
            commit,
            entries: entries.into_iter().map(|e| (e.path.clone(), e)).collect(),
        }
    }

    /// The snapshot of "no commit".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn commit(&self) -> Option<CommitId> {
        self.commit
    }

    pub fn get(&self, path: &RepoPath) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &RepoPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RepoPath, &Entry)> {
        self.entries.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RepoPath> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if any tracked path lies strictly below `dir`.
    pub fn has_descendants(&self, dir: &RepoPath) -> bool {
        self.entries
            .keys()
            .any(|p| p != dir && p.starts_with(dir))
    }

    /// Apply a delta, yielding the snapshot a commit of it would have.
    pub fn apply(&self, delta: &Delta, commit: Option<CommitId>) -> Snapshot {
        let mut entries = self.entries.clone();
        for path in &delta.removals {
            entries.remove(path);
        }
        for (path, entry) in &delta.upserts {
            entries.insert(path.clone(), entry.clone());
        }
        Snapshot { commit, entries }
    }
}

/// Rename provenance: `from` was moved to `to`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rename {
    pub from: RepoPath,
    pub to: RepoPath,
}

impl Rename {
    pub fn new(from: RepoPath, to: RepoPath) -> Self {
        Self { from, to }
    }
}

/// Changes to commit on top of a parent snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    /// Entries to add or replace.
    pub upserts: BTreeMap<RepoPath, Entry>,
    /// Paths to drop.
    pub removals: BTreeSet<RepoPath>,
    /// Provenance only; each rename must also appear as a removal of
    /// `from` and an upsert of `to`.
    pub renames: Vec<Rename>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, entry: Entry) -> &mut Self {
        self.removals.remove(&entry.path);
        self.upserts.insert(entry.path.clone(), entry);
        self
    }

    pub fn remove(&mut self, path: RepoPath) -> &mut Self {
        self.upserts.remove(&path);
        self.removals.insert(path);
        self
    }

    pub fn rename(&mut self, from: RepoPath, to: RepoPath) -> &mut Self {
        self.renames.push(Rename::new(from, to));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    fn base() -> Snapshot {
        Snapshot::new(
            None,
            vec![
                Entry::file(p("adir/hello.txt"), "hola"),
                Entry::symlink(p("symlink"), "adir/hello.txt"),
            ],
        )
    }

    #[test]
    fn snapshot_is_ordered_by_path() {
        let snap = base();
        let paths: Vec<_> = snap.paths().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["adir/hello.txt", "symlink"]);
    }

    #[test]
    fn apply_removes_then_upserts() {
        let mut delta = Delta::new();
        delta
            .remove(p("symlink"))
            .upsert(Entry::symlink(p("symbolic_link"), "adir/hello.txt"))
            .rename(p("symlink"), p("symbolic_link"));

        let next = base().apply(&delta, None);
        assert!(!next.contains(&p("symlink")));
        assert_eq!(
            next.get(&p("symbolic_link")).map(|e| e.kind),
            Some(vwc_types::EntryKind::Symlink)
        );
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn upsert_cancels_pending_removal() {
        let mut delta = Delta::new();
        delta.remove(p("a")).upsert(Entry::file(p("a"), "x"));
        assert!(delta.removals.is_empty());
        assert!(!delta.is_empty());
    }

    #[test]
    fn descendants_of_directory() {
        let snap = base();
        assert!(snap.has_descendants(&p("adir")));
        assert!(!snap.has_descendants(&p("symlink")));
        assert!(snap.has_descendants(&RepoPath::root()));
    }
}
