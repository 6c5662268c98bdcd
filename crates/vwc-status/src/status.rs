//! Status classification types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use vwc_types::RepoPath;

/// How a path differs from the parent commit. Clean paths are not listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    /// Tracked, present, and different in kind or content.
    Modified,
    /// Staged for addition.
    Added,
    /// Staged for removal.
    Removed,
    /// Tracked but gone from disk.
    Missing,
    /// On disk but not tracked.
    Unknown,
}

impl FileStatus {
    /// Single-character status code.
    pub fn code(&self) -> char {
        match self {
            Self::Modified => 'M',
            Self::Added => 'A',
            Self::Removed => 'R',
            Self::Missing => '!',
            Self::Unknown => '?',
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Status of every non-clean path, in path order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    entries: BTreeMap<RepoPath, FileStatus>,
}

impl StatusReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: RepoPath, status: FileStatus) {
        self.entries.insert(path, status);
    }

    pub fn get(&self, path: &RepoPath) -> Option<FileStatus> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &RepoPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns `true` if there are no changes of any kind.
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RepoPath, FileStatus)> {
        self.entries.iter().map(|(p, s)| (p, *s))
    }

    /// Paths with the given status.
    pub fn paths_with(&self, status: FileStatus) -> Vec<&RepoPath> {
        self.iter()
            .filter(|(_, s)| *s == status)
            .map(|(p, _)| p)
            .collect()
    }

    /// `path -> code` map, e.g. `{"symlink": 'M'}`.
    pub fn to_code_map(&self) -> BTreeMap<String, char> {
        self.iter()
            .map(|(p, s)| (p.as_str().to_string(), s.code()))
            .collect()
    }
}

impl fmt::Display for StatusReport {
    /// One `<code> <path>` line per entry.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, status) in self.iter() {
            writeln!(f, "{} {}", status.code(), path)?;
        }
        Ok(())
    }
}
