//! Diff engine for the virtual working copy.
//!
//! Compares two snapshots and renders the result as git extended unified
//! diff text. Kind lives in the mode, not in the content hash, so a path
//! whose bytes are unchanged but whose kind flipped between file and
//! symlink renders as a mode-only change.
//!
//! # Key Types
//!
//! - [`SnapshotDiff`] / [`SnapshotChange`] -- path-level changes
//!   (added, deleted, modified, mode changed, renamed)
//! - [`BlobDiff`] / [`DiffHunk`] / [`DiffLine`] -- line-level content diff
//! - [`render_git`] -- byte-exact patch text

pub mod blob_diff;
pub mod error;
pub mod render;
pub mod snapshot_diff;

pub use blob_diff::{diff_blobs, BlobDiff, DiffHunk, DiffLine, LineTag};
pub use error::{DiffError, DiffResult};
pub use render::{render_change, render_git};
pub use snapshot_diff::{diff_commit, diff_snapshots, SnapshotChange, SnapshotDiff};
