//! The working copy facade.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};
use vwc_diff::{diff_commit, diff_snapshots, render_git};
use vwc_status::{FileStatus, Staging, StatusEngine, StatusReport};
use vwc_store::{BackingStore, Delta, Snapshot};
use vwc_types::{CommitId, RepoPath};
use vwc_workdir::{
    load_json, save_json, DirEntry, DiskKind, FileSystem, LiveReader, MaterializedEntry,
    MaterializedForm, Materializer, OsFileSystem, ResolveError, Resolver, SymlinkPolicy,
    WorkdirError, WorkingState,
};

use crate::config::CheckoutConfig;
use crate::conflict::{ConflictPolicy, ReportConflicts};
use crate::error::{CheckoutError, CheckoutResult};
use crate::update::{Phase, UpdateEngine, UpdateOptions, UpdateResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Also record unknown files as added and missing files as removed.
    pub addremove: bool,
}

impl CommitOptions {
    pub fn addremove() -> Self {
        Self { addremove: true }
    }
}

/// One checkout directory bound to a backing store.
///
/// Status, diff and reads take shared locks and may run concurrently.
/// Updates, commits and staging changes are serialized through an internal
/// mutex. The symlink policy comes from the [`CheckoutConfig`] given to
/// [`WorkingCopy::open`] and is fixed for the lifetime of the instance.
pub struct WorkingCopy {
    root: PathBuf,
    config: CheckoutConfig,
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn BackingStore>,
    state: RwLock<WorkingState>,
    staging: RwLock<Staging>,
    phase: Mutex<Phase>,
    writer: Mutex<()>,
    conflict_policy: Arc<dyn ConflictPolicy>,
}

/// Holds [`Phase::Updating`] until dropped.
struct PhaseGuard<'a>(&'a Mutex<Phase>);

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a Mutex<Phase>) -> Self {
        *phase.lock().expect("lock poisoned") = Phase::Updating;
        Self(phase)
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut phase) = self.0.lock() {
            *phase = Phase::Idle;
        }
    }
}

impl WorkingCopy {
    /// Open the checkout at `root`, creating the directory if needed and
    /// loading any persisted state from its metadata directory.
    pub fn open(
        root: impl Into<PathBuf>,
        store: Arc<dyn BackingStore>,
        config: CheckoutConfig,
    ) -> CheckoutResult<Self> {
        config.validate()?;
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CheckoutError::Io {
            path: root.clone(),
            source,
        })?;

        let state = WorkingState::load(&config.state_file(&root))?;
        let staging: Staging = load_json(&config.staging_file(&root))?;
        let fs: Arc<dyn FileSystem> =
            Arc::new(OsFileSystem::new(root.clone(), config.metadata_dir.clone()));

        info!(
            root = %root.display(),
            policy = ?config.symlink_policy,
            parent = ?state.parent().map(|c| c.short_hex()),
            "opened working copy"
        );
        Ok(Self {
            root,
            config,
            fs,
            store,
            state: RwLock::new(state),
            staging: RwLock::new(staging),
            phase: Mutex::new(Phase::Idle),
            writer: Mutex::new(()),
            conflict_policy: Arc::new(ReportConflicts),
        })
    }

    pub fn with_conflict_policy(mut self, policy: Arc<dyn ConflictPolicy>) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn policy(&self) -> SymlinkPolicy {
        self.config.symlink_policy
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().expect("lock poisoned")
    }

    /// The commit the checkout is based on.
    pub fn parent(&self) -> Option<CommitId> {
        self.state.read().expect("lock poisoned").parent()
    }

    pub fn staging(&self) -> Staging {
        self.staging.read().expect("lock poisoned").clone()
    }

    // -- updates ---------------------------------------------------------

    /// Update to `target`. With `clean`, local changes are discarded.
    pub fn update(&self, target: &CommitId, clean: bool) -> CheckoutResult<UpdateResult> {
        let options = UpdateOptions {
            clean,
            ..Default::default()
        };
        self.update_with(Some(target), options)
    }

    /// Update to `target`, or to the empty tree for `None`.
    ///
    /// The parent moves to `target` unless the run was cancelled; paths
    /// left in conflict keep their local content.
    pub fn update_with(
        &self,
        target: Option<&CommitId>,
        options: UpdateOptions,
    ) -> CheckoutResult<UpdateResult> {
        let _writer = self.writer.lock().expect("lock poisoned");
        let from = self.store.snapshot_or_empty(self.parent().as_ref())?;
        let to = self.store.snapshot_or_empty(target)?;

        let _phase = PhaseGuard::enter(&self.phase);
        let mut state = self.state.read().expect("lock poisoned").clone();
        let engine = UpdateEngine::new(
            self.fs.as_ref(),
            self.policy(),
            self.conflict_policy.as_ref(),
        )
        .with_retries(self.config.transient_retries);
        let result = engine.apply(&from, &to, &mut state, &options);

        if !result.cancelled {
            state.set_parent(target.copied());
        }
        state.save(&self.config.state_file(&self.root))?;
        *self.state.write().expect("lock poisoned") = state;

        if options.clean {
            let mut staging = self.staging.write().expect("lock poisoned");
            staging.clear();
            save_json(&*staging, &self.config.staging_file(&self.root))?;
        }
        Ok(result)
    }

    // -- queries ---------------------------------------------------------

    pub fn status(&self) -> CheckoutResult<StatusReport> {
        let parent = self.parent_snapshot()?;
        let state = self.state.read().expect("lock poisoned");
        let staging = self.staging.read().expect("lock poisoned");
        let report =
            StatusEngine::new(self.fs.as_ref(), self.policy()).compute(&parent, &state, &staging)?;
        Ok(report)
    }

    /// Patch from the parent commit to the live checkout. Unknown files
    /// are left out; missing files show as deleted.
    pub fn diff(&self) -> CheckoutResult<String> {
        let parent = self.parent_snapshot()?;
        let delta = self.pending_delta(&parent, false, true)?;
        let live = parent.apply(&delta, None);
        Ok(render_git(&diff_snapshots(&parent, &live, &delta.renames)))
    }

    /// Patch a commit made on top of its parent.
    pub fn show_commit(&self, commit: &CommitId) -> CheckoutResult<String> {
        Ok(render_git(&diff_commit(self.store.as_ref(), commit)?))
    }

    /// Contents of the file `path` names, following links.
    pub fn read_file(&self, path: &RepoPath) -> CheckoutResult<Vec<u8>> {
        Ok(self.resolver().read_file(path)?)
    }

    /// Target text of the symlink at `path`, in either materialized form.
    pub fn read_link(&self, path: &RepoPath) -> CheckoutResult<Vec<u8>> {
        match self.resolver().read_link(path) {
            Err(ResolveError::NotASymlink(_)) if self.is_quasi_symlink(path) => {
                let reader = LiveReader::new(self.fs.as_ref(), self.policy());
                Ok(reader.read_target_text(path)?)
            }
            other => Ok(other?),
        }
    }

    pub fn is_file(&self, path: &RepoPath) -> bool {
        self.resolver().is_file(path)
    }

    pub fn is_dir(&self, path: &RepoPath) -> bool {
        self.resolver().is_dir(path)
    }

    /// Entries of the directory `path` names. Links inside the listing are
    /// reported as links.
    pub fn list_directory(&self, path: &RepoPath) -> CheckoutResult<Vec<DirEntry>> {
        let resolved = self.resolver().resolve(path)?;
        self.fs
            .list_directory(&resolved)
            .map_err(|e| WorkdirError::io(path, e).into())
    }

    // -- recording changes -----------------------------------------------

    /// Record the live changes as a new commit on top of the parent.
    pub fn commit(&self, message: &str, options: CommitOptions) -> CheckoutResult<CommitId> {
        let _writer = self.writer.lock().expect("lock poisoned");
        let parent_id = self.parent();
        let parent = self.store.snapshot_or_empty(parent_id.as_ref())?;
        let delta = self.pending_delta(&parent, options.addremove, options.addremove)?;
        if delta.is_empty() {
            return Err(CheckoutError::NothingToCommit);
        }
        let id = self.store.commit(parent_id.as_ref(), &delta, message)?;

        let mut state = self.state.write().expect("lock poisoned");
        for path in &delta.removals {
            state.forget(path);
        }
        for (path, entry) in &delta.upserts {
            let form = match self.fs.stat_entry(path) {
                Ok(Some(stat)) => MaterializedForm::observed(stat.kind, entry.kind),
                _ => MaterializedForm::for_kind(entry.kind, self.policy()),
            };
            state.record(
                path.clone(),
                MaterializedEntry {
                    form,
                    recorded: entry.kind,
                    hash: entry.hash,
                },
            );
        }
        state.set_parent(Some(id));
        state.save(&self.config.state_file(&self.root))?;
        drop(state);
        self.update_staging(Staging::clear)?;

        info!(
            commit = %id.short_hex(),
            upserts = delta.upserts.len(),
            removals = delta.removals.len(),
            renames = delta.renames.len(),
            "committed"
        );
        Ok(id)
    }

    /// Stage `path` for addition. A directory stages every unknown file
    /// below it; re-adding a staged removal cancels the removal.
    pub fn add(&self, path: &RepoPath) -> CheckoutResult<()> {
        let _writer = self.writer.lock().expect("lock poisoned");
        let parent = self.parent_snapshot()?;
        if self.staging().is_removed(path) {
            return self.update_staging(|s| s.add(path.clone()));
        }
        if parent.contains(path) {
            return Err(CheckoutError::AlreadyTracked(path.clone()));
        }
        let stat = self
            .fs
            .stat_entry(path)
            .map_err(|e| WorkdirError::io(path, e))?
            .ok_or_else(|| CheckoutError::PathNotFound(path.clone()))?;

        if stat.kind != DiskKind::Directory {
            return self.update_staging(|s| s.add(path.clone()));
        }
        let leaves: Vec<RepoPath> = self
            .fs
            .walk_leaves()
            .map_err(|e| WorkdirError::io(path, e))?
            .into_iter()
            .map(|(leaf, _)| leaf)
            .filter(|leaf| leaf.starts_with(path) && !parent.contains(leaf))
            .collect();
        debug!(dir = %path, files = leaves.len(), "adding directory");
        self.update_staging(|s| {
            for leaf in leaves {
                s.add(leaf);
            }
        })
    }

    /// Stop tracking `path` and delete it from disk. A staged addition is
    /// only unstaged; the file stays.
    pub fn remove(&self, path: &RepoPath) -> CheckoutResult<()> {
        let _writer = self.writer.lock().expect("lock poisoned");
        if self.staging().is_added(path) {
            return self.update_staging(|s| s.remove(path.clone()));
        }
        let parent = self.parent_snapshot()?;
        if !parent.contains(path) {
            return Err(CheckoutError::NotTracked(path.clone()));
        }
        Materializer::new(self.fs.as_ref(), self.policy()).remove(path)?;
        self.update_state(|s| {
            s.forget(path);
        })?;
        self.update_staging(|s| s.remove(path.clone()))
    }

    /// Move a tracked entry, its recorded kind and its provenance.
    ///
    /// The entry is moved as is, so a quasi-symlink stays a file that
    /// stands for a symlink at its new path.
    pub fn rename(&self, from: &RepoPath, to: &RepoPath) -> CheckoutResult<()> {
        let _writer = self.writer.lock().expect("lock poisoned");
        let parent = self.parent_snapshot()?;
        let staging = self.staging();
        let tracked =
            (parent.contains(from) && !staging.is_removed(from)) || staging.is_added(from);
        if !tracked {
            return Err(CheckoutError::NotTracked(from.clone()));
        }
        let exists = |p: &RepoPath| -> CheckoutResult<bool> {
            Ok(self
                .fs
                .stat_entry(p)
                .map_err(|e| WorkdirError::io(p, e))?
                .is_some())
        };
        if !exists(from)? {
            return Err(CheckoutError::PathNotFound(from.clone()));
        }
        if exists(to)? {
            return Err(CheckoutError::DestinationExists(to.clone()));
        }

        self.fs
            .rename(from, to)
            .map_err(|e| WorkdirError::io(from, e))?;
        self.update_state(|s| s.rename(from, to.clone()))?;
        debug!(from = %from, to = %to, "renamed entry");
        self.update_staging(|s| s.rename(from.clone(), to.clone()))
    }

    /// Restore every modified, missing and removed path from the parent and
    /// drop all staged changes. Files that were only added stay on disk as
    /// unknown.
    pub fn revert_all(&self) -> CheckoutResult<Vec<RepoPath>> {
        let _writer = self.writer.lock().expect("lock poisoned");
        let report = self.status()?;
        let parent = self.parent_snapshot()?;
        let materializer = Materializer::new(self.fs.as_ref(), self.policy());

        let mut restored = Vec::new();
        let mut state = self.state.read().expect("lock poisoned").clone();
        for (path, status) in report.iter() {
            if !matches!(
                status,
                FileStatus::Modified | FileStatus::Missing | FileStatus::Removed
            ) {
                continue;
            }
            let Some(entry) = parent.get(path) else {
                continue;
            };
            state.record(path.clone(), materializer.realize(entry)?);
            restored.push(path.clone());
        }
        state.save(&self.config.state_file(&self.root))?;
        *self.state.write().expect("lock poisoned") = state;
        self.update_staging(Staging::clear)?;

        info!(restored = restored.len(), "reverted working copy");
        Ok(restored)
    }

    // -- internals -------------------------------------------------------

    fn parent_snapshot(&self) -> CheckoutResult<Snapshot> {
        Ok(self.store.snapshot_or_empty(self.parent().as_ref())?)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.fs.as_ref(), self.config.max_symlink_hops)
    }

    fn is_quasi_symlink(&self, path: &RepoPath) -> bool {
        let state = self.state.read().expect("lock poisoned");
        match state.get(path) {
            Some(record) => record.is_quasi_symlink(),
            None => false,
        }
    }

    /// The delta that turns the parent snapshot into the live checkout.
    ///
    /// Modified and staged paths are always included. `unknown` adds
    /// untracked files, `missing` drops tracked files gone from disk.
    fn pending_delta(
        &self,
        parent: &Snapshot,
        unknown: bool,
        missing: bool,
    ) -> CheckoutResult<Delta> {
        let state = self.state.read().expect("lock poisoned");
        let staging = self.staging.read().expect("lock poisoned");
        let report =
            StatusEngine::new(self.fs.as_ref(), self.policy()).compute(parent, &state, &staging)?;
        let reader = LiveReader::new(self.fs.as_ref(), self.policy());

        let mut delta = Delta::new();
        for (path, status) in report.iter() {
            let capture = match status {
                FileStatus::Modified | FileStatus::Added => true,
                FileStatus::Unknown => unknown,
                FileStatus::Removed => {
                    delta.remove(path.clone());
                    false
                }
                FileStatus::Missing => {
                    if missing && parent.contains(path) {
                        delta.remove(path.clone());
                    }
                    false
                }
            };
            if !capture {
                continue;
            }
            if let Some(entry) = reader.capture(path, state.recorded_kind(path))? {
                delta.upsert(entry);
            }
        }

        for rename in staging.renames() {
            if delta.removals.contains(&rename.from) && delta.upserts.contains_key(&rename.to) {
                delta.rename(rename.from, rename.to);
            }
        }
        Ok(delta)
    }

    fn update_state(&self, f: impl FnOnce(&mut WorkingState)) -> CheckoutResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        f(&mut state);
        state.save(&self.config.state_file(&self.root))?;
        Ok(())
    }

    fn update_staging(&self, f: impl FnOnce(&mut Staging)) -> CheckoutResult<()> {
        let mut staging = self.staging.write().expect("lock poisoned");
        f(&mut staging);
        save_json(&*staging, &self.config.staging_file(&self.root))?;
        Ok(())
    }
}

impl std::fmt::Debug for WorkingCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingCopy")
            .field("root", &self.root)
            .field("policy", &self.config.symlink_policy)
            .field("parent", &self.parent())
            .field("phase", &self.phase())
            .finish()
    }
}
