//! Status engine for the virtual working copy.
//!
//! Compares the live checkout against a commit snapshot and classifies
//! every path that differs, with a staging overlay on top.
//!
//! # Key Types
//!
//! - [`StatusEngine`] -- computes a [`StatusReport`] or a single path's
//!   [`LocalState`]
//! - [`Staging`] -- pending adds, removals and renames for the next commit
//! - [`FileStatus`] -- M / A / R / ! / ?

pub mod engine;
pub mod error;
pub mod staging;
pub mod status;

pub use engine::{LocalState, StatusEngine};
pub use error::{StatusError, StatusResult};
pub use staging::Staging;
pub use status::{FileStatus, StatusReport};
