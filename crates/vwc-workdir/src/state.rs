//! Persisted working state.
//!
//! A quasi-symlink on disk is a plain file, so the disk alone cannot say
//! whether it stands for a link. [`WorkingState`] keeps that knowledge out
//! of band: for every path the working copy materialized, the kind it
//! represents and the form it was given. It lives as JSON in the metadata
//! directory and is rewritten atomically.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vwc_types::{CommitId, EntryKind, ObjectId, RepoPath};

use crate::error::{WorkdirError, WorkdirResult};
use crate::fs::DiskKind;
use crate::policy::SymlinkPolicy;

/// How an entry was realized on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializedForm {
    File,
    Executable,
    Symlink,
    QuasiSymlink,
    Directory,
}

impl MaterializedForm {
    /// The form an entry of `kind` takes under `policy`.
    pub fn for_kind(kind: EntryKind, policy: SymlinkPolicy) -> Self {
        match (kind, policy) {
            (EntryKind::Regular, _) => Self::File,
            (EntryKind::Executable, _) => Self::Executable,
            (EntryKind::Symlink, SymlinkPolicy::Enabled) => Self::Symlink,
            (EntryKind::Symlink, SymlinkPolicy::Disabled) => Self::QuasiSymlink,
            (EntryKind::Directory, _) => Self::Directory,
        }
    }

    /// The form of an entry found on disk as `disk` and captured as `kind`.
    /// A plain file standing for a symlink is a quasi-symlink.
    pub fn observed(disk: DiskKind, kind: EntryKind) -> Self {
        match (disk, kind) {
            (DiskKind::Symlink, _) => Self::Symlink,
            (DiskKind::Directory, _) | (_, EntryKind::Directory) => Self::Directory,
            (_, EntryKind::Symlink) => Self::QuasiSymlink,
            (_, EntryKind::Executable) => Self::Executable,
            (_, EntryKind::Regular) => Self::File,
        }
    }
}

/// Per-path record of a materialized entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedEntry {
    pub form: MaterializedForm,
    /// The kind the entry represents, whatever its form.
    pub recorded: EntryKind,
    pub hash: ObjectId,
}

impl MaterializedEntry {
    pub fn is_quasi_symlink(&self) -> bool {
        self.form == MaterializedForm::QuasiSymlink
    }
}

/// Parent commit plus the materialization record of every tracked path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingState {
    parent: Option<CommitId>,
    entries: BTreeMap<RepoPath, MaterializedEntry>,
}

impl WorkingState {
    pub fn new(parent: Option<CommitId>) -> Self {
        Self {
            parent,
            entries: BTreeMap::new(),
        }
    }

    pub fn parent(&self) -> Option<CommitId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<CommitId>) {
        self.parent = parent;
    }

    pub fn get(&self, path: &RepoPath) -> Option<&MaterializedEntry> {
        self.entries.get(path)
    }

    /// The kind recorded for `path`, if the working copy wrote it.
    pub fn recorded_kind(&self, path: &RepoPath) -> Option<EntryKind> {
        self.entries.get(path).map(|e| e.recorded)
    }

    pub fn record(&mut self, path: RepoPath, entry: MaterializedEntry) {
        self.entries.insert(path, entry);
    }

    pub fn forget(&mut self, path: &RepoPath) -> Option<MaterializedEntry> {
        self.entries.remove(path)
    }

    /// Move the record of `from` to `to`.
    pub fn rename(&mut self, from: &RepoPath, to: RepoPath) {
        if let Some(entry) = self.entries.remove(from) {
            self.entries.insert(to, entry);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RepoPath, &MaterializedEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load state from `file`. A missing file is an empty state.
    pub fn load(file: &Path) -> WorkdirResult<Self> {
        load_json(file)
    }

    /// Atomically replace `file` with the current state.
    pub fn save(&self, file: &Path) -> WorkdirResult<()> {
        save_json(self, file)?;
        debug!(entries = self.entries.len(), "saved working state");
        Ok(())
    }
}

/// Read a JSON document from the metadata directory. A missing file
/// yields the default value.
pub fn load_json<T: DeserializeOwned + Default>(file: &Path) -> WorkdirResult<T> {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(WorkdirError::State(format!("{}: {e}", file.display()))),
    };
    serde_json::from_slice(&bytes).map_err(|e| WorkdirError::State(format!("{}: {e}", file.display())))
}

/// Write `value` as JSON through a temporary file in the same directory,
/// then rename it over `file`.
pub fn save_json<T: Serialize>(value: &T, file: &Path) -> WorkdirResult<()> {
    let state_err = |e: std::io::Error| WorkdirError::State(format!("{}: {e}", file.display()));
    let dir = file
        .parent()
        .ok_or_else(|| WorkdirError::State(format!("{} has no parent", file.display())))?;
    std::fs::create_dir_all(dir).map_err(state_err)?;

    let json = serde_json::to_vec_pretty(value).map_err(|e| WorkdirError::State(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(state_err)?;
    tmp.write_all(&json).map_err(state_err)?;
    tmp.as_file().sync_all().map_err(state_err)?;
    tmp.persist(file).map_err(|e| state_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    fn quasi(hash: ObjectId) -> MaterializedEntry {
        MaterializedEntry {
            form: MaterializedForm::QuasiSymlink,
            recorded: EntryKind::Symlink,
            hash,
        }
    }

    #[test]
    fn form_follows_policy_only_for_symlinks() {
        use MaterializedForm as F;
        assert_eq!(F::for_kind(EntryKind::Symlink, SymlinkPolicy::Enabled), F::Symlink);
        assert_eq!(F::for_kind(EntryKind::Symlink, SymlinkPolicy::Disabled), F::QuasiSymlink);
        assert_eq!(F::for_kind(EntryKind::Regular, SymlinkPolicy::Disabled), F::File);
        assert_eq!(F::for_kind(EntryKind::Executable, SymlinkPolicy::Enabled), F::Executable);
    }

    #[test]
    fn observed_form_of_a_plain_file_standing_for_a_link() {
        use MaterializedForm as F;
        assert_eq!(F::observed(DiskKind::File, EntryKind::Symlink), F::QuasiSymlink);
        assert_eq!(F::observed(DiskKind::Symlink, EntryKind::Symlink), F::Symlink);
        assert_eq!(F::observed(DiskKind::File, EntryKind::Executable), F::Executable);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".vwc").join("state.json");

        let mut state = WorkingState::new(Some(ObjectId::from_bytes(b"c1")));
        state.record(p("symlink"), quasi(ObjectId::from_bytes(b"adir/hello.txt")));
        state.save(&file).unwrap();

        let loaded = WorkingState::load(&file).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.get(&p("symlink")).unwrap().is_quasi_symlink());
        assert_eq!(loaded.recorded_kind(&p("symlink")), Some(EntryKind::Symlink));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = WorkingState::load(&dir.path().join("absent.json")).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.parent(), None);
    }

    #[test]
    fn corrupt_file_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("state.json");
        std::fs::write(&file, b"not json").unwrap();
        assert!(matches!(WorkingState::load(&file), Err(WorkdirError::State(_))));
    }

    #[test]
    fn rename_moves_the_record() {
        let mut state = WorkingState::default();
        state.record(p("symlink"), quasi(ObjectId::from_bytes(b"t")));
        state.rename(&p("symlink"), p("symbolic_link"));
        assert!(state.get(&p("symlink")).is_none());
        assert_eq!(state.recorded_kind(&p("symbolic_link")), Some(EntryKind::Symlink));
        assert_eq!(state.len(), 1);
    }
}
