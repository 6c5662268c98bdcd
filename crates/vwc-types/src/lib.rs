//! Foundation types for the virtual working copy (VWC).
//!
//! Every other VWC crate depends on `vwc-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash)
//! - [`RepoPath`] -- Validated, `/`-separated path relative to the checkout root
//! - [`EntryKind`] -- Semantic kind of a tracked entry (regular, executable, symlink, directory)

pub mod error;
pub mod kind;
pub mod object;
pub mod path;

pub use error::TypeError;
pub use kind::EntryKind;
pub use object::ObjectId;
pub use path::RepoPath;

/// Identifier of a commit in the backing store.
pub type CommitId = ObjectId;
