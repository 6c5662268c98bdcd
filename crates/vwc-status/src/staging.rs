//! The staging area: changes the next commit will record beyond what is
//! already visible as modifications on disk.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vwc_store::Rename;
use vwc_types::RepoPath;

/// Pending additions, removals and renames.
///
/// A staged rename is also a staged removal of its source and a staged
/// addition of its destination; the rename itself is provenance only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staging {
    added: BTreeSet<RepoPath>,
    removed: BTreeSet<RepoPath>,
    /// Destination to original source.
    renames: BTreeMap<RepoPath, RepoPath>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn is_added(&self, path: &RepoPath) -> bool {
        self.added.contains(path)
    }

    pub fn is_removed(&self, path: &RepoPath) -> bool {
        self.removed.contains(path)
    }

    pub fn added(&self) -> impl Iterator<Item = &RepoPath> {
        self.added.iter()
    }

    pub fn removed(&self) -> impl Iterator<Item = &RepoPath> {
        self.removed.iter()
    }

    /// Where a staged rename destination came from.
    pub fn rename_source(&self, to: &RepoPath) -> Option<&RepoPath> {
        self.renames.get(to)
    }

    /// Staged renames in destination order.
    pub fn renames(&self) -> Vec<Rename> {
        self.renames
            .iter()
            .map(|(to, from)| Rename::new(from.clone(), to.clone()))
            .collect()
    }

    /// Stage `path` for addition. Re-adding a staged removal cancels it.
    pub fn add(&mut self, path: RepoPath) {
        if self.removed.remove(&path) {
            debug!(path = %path, "unstaged removal");
            return;
        }
        self.added.insert(path);
    }

    /// Stage `path` for removal. Removing a staged addition just forgets
    /// it, including any rename that produced it.
    pub fn remove(&mut self, path: RepoPath) {
        if self.added.remove(&path) {
            self.renames.remove(&path);
            return;
        }
        self.removed.insert(path);
    }

    /// Stage a rename. Renaming a rename destination again keeps the
    /// original source.
    pub fn rename(&mut self, from: RepoPath, to: RepoPath) {
        let original = match self.renames.remove(&from) {
            Some(original) => {
                self.added.remove(&from);
                original
            }
            None if self.added.remove(&from) => {
                // Moving an uncommitted addition is just another addition.
                self.add(to);
                return;
            }
            None => {
                self.removed.insert(from.clone());
                from
            }
        };
        self.removed.remove(&to);
        if original == to {
            debug!(path = %to, "rename undone");
            return;
        }
        self.added.insert(to.clone());
        self.renames.insert(to, original);
    }

    /// Forget staged additions and renames, keeping removals.
    pub fn forget_added(&mut self) {
        self.added.clear();
        self.renames.clear();
    }

    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.renames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    #[test]
    fn rename_stages_remove_and_add() {
        let mut staging = Staging::new();
        staging.rename(p("symlink"), p("symbolic_link"));

        assert!(staging.is_removed(&p("symlink")));
        assert!(staging.is_added(&p("symbolic_link")));
        assert_eq!(staging.rename_source(&p("symbolic_link")), Some(&p("symlink")));
        assert_eq!(
            staging.renames(),
            vec![Rename::new(p("symlink"), p("symbolic_link"))]
        );
    }

    #[test]
    fn chained_rename_keeps_original_source() {
        let mut staging = Staging::new();
        staging.rename(p("a"), p("b"));
        staging.rename(p("b"), p("c"));

        assert!(staging.is_removed(&p("a")));
        assert!(!staging.is_added(&p("b")));
        assert!(!staging.is_removed(&p("b")));
        assert_eq!(staging.renames(), vec![Rename::new(p("a"), p("c"))]);
    }

    #[test]
    fn renaming_back_leaves_nothing_staged() {
        let mut staging = Staging::new();
        staging.rename(p("symlink"), p("moved"));
        staging.rename(p("moved"), p("symlink"));
        assert!(staging.is_empty());
        assert!(staging.renames().is_empty());
        assert!(staging.rename_source(&p("symlink")).is_none());
    }

    #[test]
    fn moving_a_new_file_is_not_a_rename() {
        let mut staging = Staging::new();
        staging.add(p("new"));
        staging.rename(p("new"), p("newer"));
        assert!(staging.is_added(&p("newer")));
        assert!(!staging.is_removed(&p("new")));
        assert!(staging.renames().is_empty());
    }

    #[test]
    fn add_and_remove_cancel() {
        let mut staging = Staging::new();
        staging.remove(p("x"));
        staging.add(p("x"));
        assert!(staging.is_empty());

        staging.add(p("y"));
        staging.remove(p("y"));
        assert!(staging.is_empty());
    }

    #[test]
    fn forget_added_keeps_removals() {
        let mut staging = Staging::new();
        staging.rename(p("a"), p("b"));
        staging.forget_added();
        assert!(staging.is_removed(&p("a")));
        assert!(!staging.is_added(&p("b")));
        assert!(staging.renames().is_empty());
    }

    #[test]
    fn serializes_to_json() {
        let mut staging = Staging::new();
        staging.rename(p("symlink"), p("symbolic_link"));
        let json = serde_json::to_string(&staging).unwrap();
        let back: Staging = serde_json::from_str(&json).unwrap();
        assert_eq!(back, staging);
    }
}
