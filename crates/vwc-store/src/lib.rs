//! Backing store adapter for the virtual working copy.
//!
//! The working copy never talks to version history directly. It asks a
//! [`BackingStore`] for immutable [`Snapshot`]s of commits and hands it a
//! [`Delta`] when the user commits. This crate provides that boundary plus a
//! content-addressed object store to back it.
//!
//! # Object Types
//!
//! - [`Blob`] -- entry content (file bytes or symlink target text)
//! - [`Tree`] -- flat, sorted listing of every tracked path in a commit
//! - [`CommitObject`] -- tree + parent + message + rename provenance
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Blob ids equal entry content hashes, so snapshot entries can be
//!    verified on load.
//! 3. Concurrent reads are always safe.

pub mod backing;
pub mod entry;
pub mod error;
pub mod memory;
pub mod object;
pub mod snapshot;
pub mod traits;

pub use backing::{BackingStore, CommitInfo, ObjectBackingStore};
pub use entry::Entry;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, CommitObject, ObjectKind, StoredObject, Tree, TreeEntry};
pub use snapshot::{Delta, Rename, Snapshot};
pub use traits::ObjectStore;
