//! Update engine and working copy facade.
//!
//! [`WorkingCopy`] ties the layers together for one checkout directory:
//! it pulls snapshots from a [`BackingStore`](vwc_store::BackingStore),
//! drives [`UpdateEngine`] transitions between commits, answers status and
//! diff queries, and records new commits from the live tree.
//!
//! # Key Types
//!
//! - [`WorkingCopy`] -- the facade
//! - [`CheckoutConfig`] -- per-checkout settings, including the symlink policy
//! - [`UpdateEngine`] / [`UpdateResult`] -- best-effort commit-to-commit updates
//! - [`ConflictPolicy`] -- what to do when a local change meets an incoming one

pub mod config;
pub mod conflict;
pub mod error;
pub mod update;
pub mod working_copy;

pub use config::CheckoutConfig;
pub use conflict::{
    Conflict, ConflictContext, ConflictPolicy, ConflictReason, PreferIncoming, ReportConflicts,
    Resolution,
};
pub use error::{CheckoutError, CheckoutResult};
pub use update::{plan_update, PathChange, Phase, UpdateEngine, UpdateOptions, UpdateResult};
pub use working_copy::{CommitOptions, WorkingCopy};
