//! Working directory layer for the virtual working copy.
//!
//! Everything that touches the checkout directory lives here:
//!
//! - [`FileSystem`] / [`OsFileSystem`] -- the OS capability, rooted at the
//!   checkout and addressed by [`RepoPath`](vwc_types::RepoPath)
//! - [`SymlinkPolicy`] -- per-checkout choice between real links and
//!   quasi-symlinks
//! - [`Materializer`] -- realizes entries on disk, atomically per path
//! - [`WorkingState`] -- the out-of-band record of what each path *is*,
//!   independent of how it is materialized
//! - [`LiveReader`] -- reads live entries back and hashes them the same way
//!   the backing store does
//! - [`Resolver`] -- bounded, cycle-aware symlink resolution

pub mod error;
pub mod fs;
pub mod live;
pub mod materializer;
pub mod policy;
pub mod resolve;
pub mod state;

pub use error::{ResolveError, UnresolvableReason, WorkdirError, WorkdirResult};
pub use fs::{DirEntry, DiskKind, EntryStat, FileSystem, OsFileSystem};
pub use live::LiveReader;
pub use materializer::Materializer;
pub use policy::SymlinkPolicy;
pub use resolve::{NodeType, Resolver, DEFAULT_MAX_HOPS};
pub use state::{load_json, save_json, MaterializedEntry, MaterializedForm, WorkingState};
