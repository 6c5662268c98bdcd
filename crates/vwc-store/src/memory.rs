use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use vwc_types::{CommitId, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Object store held in memory, partitioned by object kind.
///
/// Blobs are keyed by content hash alone, so every entry with the same
/// bytes shares one blob: a symlink recorded from a real link and one
/// recorded from a quasi-symlink occupy a single slot. Commits are indexed
/// separately so the history held by an embedded store can be listed.
#[derive(Default)]
pub struct InMemoryObjectStore {
    inner: RwLock<Partitions>,
}

#[derive(Default)]
struct Partitions {
    blobs: HashMap<ObjectId, Vec<u8>>,
    trees: HashMap<ObjectId, Vec<u8>>,
    commits: HashMap<ObjectId, Vec<u8>>,
    commit_order: BTreeSet<(u64, ObjectId)>,
}

impl Partitions {
    fn of(&self, kind: ObjectKind) -> &HashMap<ObjectId, Vec<u8>> {
        match kind {
            ObjectKind::Blob => &self.blobs,
            ObjectKind::Tree => &self.trees,
            ObjectKind::Commit => &self.commits,
        }
    }

    fn of_mut(&mut self, kind: ObjectKind) -> &mut HashMap<ObjectId, Vec<u8>> {
        match kind {
            ObjectKind::Blob => &mut self.blobs,
            ObjectKind::Tree => &mut self.trees,
            ObjectKind::Commit => &mut self.commits,
        }
    }

    fn find(&self, id: &ObjectId) -> Option<StoredObject> {
        [ObjectKind::Commit, ObjectKind::Tree, ObjectKind::Blob]
            .into_iter()
            .find_map(|kind| {
                self.of(kind)
                    .get(id)
                    .map(|data| StoredObject::new(kind, data.clone()))
            })
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of one kind.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.inner.read().expect("lock poisoned").of(kind).len()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("lock poisoned");
        inner.blobs.len() + inner.trees.len() + inner.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commit ids in the order they were first written.
    pub fn commit_ids(&self) -> Vec<CommitId> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.commit_order.iter().map(|(_, id)| *id).collect()
    }

    /// Total size of blob content, counting shared blobs once.
    pub fn blob_bytes(&self) -> u64 {
        let inner = self.inner.read().expect("lock poisoned");
        inner.blobs.values().map(|data| data.len() as u64).sum()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.inner.read().expect("lock poisoned").find(id))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.of(object.kind).contains_key(&id) {
            return Ok(id);
        }
        inner.of_mut(object.kind).insert(id, object.data.clone());
        if object.kind == ObjectKind::Commit {
            let seq = inner.commit_order.len() as u64;
            inner.commit_order.insert((seq, id));
        }
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok([ObjectKind::Commit, ObjectKind::Tree, ObjectKind::Blob]
            .into_iter()
            .any(|kind| inner.of(kind).contains_key(id)))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("blobs", &self.count(ObjectKind::Blob))
            .field("trees", &self.count(ObjectKind::Tree))
            .field("commits", &self.count(ObjectKind::Commit))
            .finish()
    }
}
