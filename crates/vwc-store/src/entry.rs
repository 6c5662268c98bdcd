use bytes::Bytes;
use vwc_crypto::ContentHasher;
use vwc_types::{EntryKind, ObjectId, RepoPath};

/// A tracked path with its semantic kind and content.
///
/// For symlinks `content` is exactly the target text, with no trailing
/// newline added. `hash` is always the blob identity of `content`, no matter
/// how the entry is (or will be) materialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub path: RepoPath,
    pub kind: EntryKind,
    pub content: Bytes,
    pub hash: ObjectId,
}

impl Entry {
    pub fn new(path: RepoPath, kind: EntryKind, content: impl Into<Bytes>) -> Self {
        let content = match kind {
            EntryKind::Directory => Bytes::new(),
            _ => content.into(),
        };
        let hash = ContentHasher::hash_entry(kind, &content);
        Self {
            path,
            kind,
            content,
            hash,
        }
    }

    pub fn file(path: RepoPath, content: impl Into<Bytes>) -> Self {
        Self::new(path, EntryKind::Regular, content)
    }

    pub fn executable(path: RepoPath, content: impl Into<Bytes>) -> Self {
        Self::new(path, EntryKind::Executable, content)
    }

    pub fn symlink(path: RepoPath, target: &str) -> Self {
        Self::new(path, EntryKind::Symlink, Bytes::copy_from_slice(target.as_bytes()))
    }

    pub fn directory(path: RepoPath) -> Self {
        Self::new(path, EntryKind::Directory, Bytes::new())
    }

    /// Target text of a symlink entry.
    pub fn target_text(&self) -> Option<&[u8]> {
        self.kind.is_symlink().then_some(&self.content[..])
    }

    /// Same kind and same content hash. Paths are not compared.
    pub fn same_identity(&self, other: &Entry) -> bool {
        self.kind == other.kind && self.hash == other.hash
    }

    /// The same entry at another path.
    pub fn with_path(&self, path: RepoPath) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }
}
