use tracing::{debug, trace};
use vwc_store::Entry;
use vwc_types::{EntryKind, RepoPath};

use crate::error::{WorkdirError, WorkdirResult};
use crate::fs::FileSystem;
use crate::policy::SymlinkPolicy;
use crate::state::{MaterializedEntry, MaterializedForm};

/// Writes snapshot entries into the checkout according to the symlink
/// policy.
///
/// A symlink entry becomes a real link under [`SymlinkPolicy::Enabled`] and
/// a regular file containing exactly the target text under
/// [`SymlinkPolicy::Disabled`]. Either way the returned
/// [`MaterializedEntry`] records `Symlink` as the entry's kind.
pub struct Materializer<'a> {
    fs: &'a dyn FileSystem,
    policy: SymlinkPolicy,
}

impl<'a> Materializer<'a> {
    pub fn new(fs: &'a dyn FileSystem, policy: SymlinkPolicy) -> Self {
        Self { fs, policy }
    }

    pub fn policy(&self) -> SymlinkPolicy {
        self.policy
    }

    /// Create or replace `entry` on disk.
    ///
    /// Target text is written verbatim. It is never validated, so dangling
    /// and cyclic links materialize like any other.
    pub fn realize(&self, entry: &Entry) -> WorkdirResult<MaterializedEntry> {
        let path = &entry.path;
        let form = MaterializedForm::for_kind(entry.kind, self.policy);
        let result = match form {
            MaterializedForm::File => self.fs.write_file(path, &entry.content, false),
            MaterializedForm::Executable => self.fs.write_file(path, &entry.content, true),
            MaterializedForm::QuasiSymlink => self.fs.write_file(path, &entry.content, false),
            MaterializedForm::Symlink => self.fs.create_symlink(path, &entry.content),
            MaterializedForm::Directory => self.fs.create_dir(path),
        };
        result.map_err(|e| WorkdirError::io(path, e))?;
        trace!(path = %path, ?form, "materialized entry");
        Ok(MaterializedEntry {
            form,
            recorded: entry.kind,
            hash: entry.hash,
        })
    }

    /// Remove whatever is at `path`, pruning parents left empty. An absent
    /// path is not an error.
    pub fn remove(&self, path: &RepoPath) -> WorkdirResult<bool> {
        let removed = self
            .fs
            .remove_entry(path)
            .map_err(|e| WorkdirError::io(path, e))?;
        if removed {
            debug!(path = %path, "removed entry");
        }
        Ok(removed)
    }

    /// Materialize every entry, stopping at the first failure. Used for a
    /// fresh checkout.
    pub fn realize_all<'e>(
        &self,
        entries: impl IntoIterator<Item = &'e Entry>,
    ) -> WorkdirResult<Vec<(RepoPath, MaterializedEntry)>> {
        entries
            .into_iter()
            .map(|entry| Ok((entry.path.clone(), self.realize(entry)?)))
            .collect()
    }

    /// The form `kind` would be given under this materializer's policy.
    pub fn form_for(&self, kind: EntryKind) -> MaterializedForm {
        MaterializedForm::for_kind(kind, self.policy)
    }
}
