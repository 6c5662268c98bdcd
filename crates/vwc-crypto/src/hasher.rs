use vwc_types::{EntryKind, ObjectId};

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher prepends its domain tag (e.g. `"vwc-blob-v1"`) so that a blob
/// and a tree with identical bytes never share an id.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for entry content (file bytes or symlink target text).
    pub const BLOB: Self = Self {
        domain: "vwc-blob-v1",
    };
    /// Hasher for serialized trees.
    pub const TREE: Self = Self {
        domain: "vwc-tree-v1",
    };
    /// Hasher for serialized commit objects.
    pub const COMMIT: Self = Self {
        domain: "vwc-commit-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Content identity of a tracked entry.
    ///
    /// The kind is deliberately not mixed in: kind lives in the mode, so a
    /// file and a symlink with the same bytes differ only by mode.
    /// Directories have no content and hash as the empty blob.
    pub fn hash_entry(kind: EntryKind, content: &[u8]) -> ObjectId {
        match kind {
            EntryKind::Directory => Self::BLOB.hash(&[]),
            EntryKind::Regular | EntryKind::Executable | EntryKind::Symlink => {
                Self::BLOB.hash(content)
            }
        }
    }

    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
