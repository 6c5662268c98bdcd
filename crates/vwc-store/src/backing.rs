//! The backing store boundary.
//!
//! [`BackingStore`] is all the working copy needs from version history:
//! snapshots of commits, a way to record a new commit, and the metadata of
//! an existing one. [`ObjectBackingStore`] implements it on top of any
//! [`ObjectStore`].

use std::sync::Arc;

use tracing::debug;
use vwc_crypto::ContentHasher;
use vwc_types::{CommitId, ObjectId};

use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, CommitObject, Tree, TreeEntry};
use crate::snapshot::{Delta, Rename, Snapshot};
use crate::traits::ObjectStore;

/// Metadata of a commit, without its tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    pub message: String,
    pub renames: Vec<Rename>,
}

/// Version-history adapter consumed by the working copy.
pub trait BackingStore: Send + Sync {
    /// Full snapshot of a commit.
    fn get_snapshot(&self, commit: &CommitId) -> StoreResult<Snapshot>;

    /// Record `delta` on top of `parent` and return the new commit id.
    fn commit(
        &self,
        parent: Option<&CommitId>,
        delta: &Delta,
        message: &str,
    ) -> StoreResult<CommitId>;

    fn commit_info(&self, commit: &CommitId) -> StoreResult<CommitInfo>;

    /// Snapshot of `commit`, or the empty snapshot for `None`.
    fn snapshot_or_empty(&self, commit: Option<&CommitId>) -> StoreResult<Snapshot> {
        match commit {
            Some(id) => self.get_snapshot(id),
            None => Ok(Snapshot::empty()),
        }
    }
}

/// [`BackingStore`] over a content-addressed object store.
#[derive(Clone)]
pub struct ObjectBackingStore {
    objects: Arc<dyn ObjectStore>,
}

impl ObjectBackingStore {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    fn read_commit(&self, id: &CommitId) -> StoreResult<CommitObject> {
        let stored = self.objects.read_required(id)?;
        CommitObject::from_stored_object(&stored)
    }

    fn read_entry(&self, tree_entry: &TreeEntry) -> StoreResult<Entry> {
        let stored = self.objects.read_required(&tree_entry.object_id)?;
        let blob = Blob::from_stored_object(&stored)?;
        let entry = Entry::new(tree_entry.path.clone(), tree_entry.kind, blob.data);
        if entry.hash != tree_entry.object_id {
            return Err(StoreError::HashMismatch {
                id: tree_entry.object_id,
                computed: entry.hash,
            });
        }
        Ok(entry)
    }

    fn write_entry(&self, entry: &Entry) -> StoreResult<ObjectId> {
        let id = self
            .objects
            .write(&Blob::new(entry.content.to_vec()).to_stored_object())?;
        debug_assert_eq!(id, ContentHasher::hash_entry(entry.kind, &entry.content));
        Ok(id)
    }
}

fn validate_delta(base: &Snapshot, delta: &Delta) -> StoreResult<()> {
    for path in &delta.removals {
        if !base.contains(path) {
            return Err(StoreError::InvalidDelta {
                path: path.clone(),
                reason: "removal of an untracked path".into(),
            });
        }
    }
    for rename in &delta.renames {
        if !delta.removals.contains(&rename.from) {
            return Err(StoreError::InvalidDelta {
                path: rename.from.clone(),
                reason: "rename source is not removed".into(),
            });
        }
        if !delta.upserts.contains_key(&rename.to) {
            return Err(StoreError::InvalidDelta {
                path: rename.to.clone(),
                reason: "rename destination is not added".into(),
            });
        }
    }
    Ok(())
}

impl BackingStore for ObjectBackingStore {
    fn get_snapshot(&self, commit: &CommitId) -> StoreResult<Snapshot> {
        let commit_obj = self.read_commit(commit)?;
        let stored_tree = self.objects.read_required(&commit_obj.tree)?;
        let tree = Tree::from_stored_object(&stored_tree)?;
        let entries = tree
            .entries
            .iter()
            .map(|te| self.read_entry(te))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Snapshot::new(Some(*commit), entries))
    }

    fn commit(
        &self,
        parent: Option<&CommitId>,
        delta: &Delta,
        message: &str,
    ) -> StoreResult<CommitId> {
        let base = self.snapshot_or_empty(parent)?;
        validate_delta(&base, delta)?;
        let next = base.apply(delta, None);

        let mut tree_entries = Vec::with_capacity(next.len());
        for entry in next.entries() {
            let object_id = self.write_entry(entry)?;
            tree_entries.push(TreeEntry::new(entry.kind, entry.path.clone(), object_id));
        }
        let tree = Tree::new(tree_entries);
        let tree_id = self.objects.write(&tree.to_stored_object()?)?;

        let commit = CommitObject {
            parent: parent.copied(),
            tree: tree_id,
            message: message.to_string(),
            renames: delta.renames.clone(),
        };
        let id = self.objects.write(&commit.to_stored_object()?)?;
        debug!(
            commit = %id.short_hex(),
            entries = tree.len(),
            upserts = delta.upserts.len(),
            removals = delta.removals.len(),
            "recorded commit"
        );
        Ok(id)
    }

    fn commit_info(&self, commit: &CommitId) -> StoreResult<CommitInfo> {
        let obj = self.read_commit(commit)?;
        Ok(CommitInfo {
            id: *commit,
            parent: obj.parent,
            message: obj.message,
            renames: obj.renames,
        })
    }
}

impl std::fmt::Debug for ObjectBackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBackingStore").finish_non_exhaustive()
    }
}
