//! Status computation against the live checkout.

use tracing::{debug, trace};
use vwc_store::{Entry, Snapshot};
use vwc_types::{EntryKind, RepoPath};
use vwc_workdir::{FileSystem, LiveReader, SymlinkPolicy, WorkdirResult, WorkingState};

use crate::error::{StatusError, StatusResult};
use crate::staging::Staging;
use crate::status::{FileStatus, StatusReport};

/// What is at one path compared with the entry expected there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalState {
    /// Matches the expected entry.
    Clean,
    /// Tracked and present, but different in kind or content. Carries the
    /// live entry.
    Modified(Entry),
    /// Tracked but gone from disk.
    Missing,
    /// Not tracked, yet something occupies the path.
    Untracked(Entry),
    /// Not tracked and nothing on disk.
    Absent,
}

impl LocalState {
    /// Returns `true` if the working copy holds local changes at this path.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, Self::Clean | Self::Absent)
    }

    /// The live entry, if one is on disk.
    pub fn live(&self) -> Option<&Entry> {
        match self {
            Self::Modified(e) | Self::Untracked(e) => Some(e),
            _ => None,
        }
    }
}

/// Classifies live paths against a snapshot.
///
/// A live entry's kind comes from [`LiveReader::live_kind`]: under
/// [`SymlinkPolicy::Disabled`] a plain file the working state recorded as
/// a symlink still counts as one, so a quasi-symlink whose text changed and
/// a real link whose target changed both come out as `Modified`.
pub struct StatusEngine<'a> {
    reader: LiveReader<'a>,
    fs: &'a dyn FileSystem,
}

impl<'a> StatusEngine<'a> {
    pub fn new(fs: &'a dyn FileSystem, policy: SymlinkPolicy) -> Self {
        Self {
            reader: LiveReader::new(fs, policy),
            fs,
        }
    }

    /// Classify a single path against the entry `expected` there.
    pub fn path_status(
        &self,
        path: &RepoPath,
        expected: Option<&Entry>,
        state: &WorkingState,
    ) -> StatusResult<LocalState> {
        let recorded = state.recorded_kind(path).or(expected.map(|e| e.kind));
        let Some(expected) = expected else {
            return Ok(match self.capture(path, recorded)? {
                Some(live) => LocalState::Untracked(live),
                None => LocalState::Absent,
            });
        };
        let first = self.retry_once(path, || self.reader.live_hash(path, recorded))?;
        match first {
            None => return Ok(LocalState::Missing),
            Some((kind, hash)) if kind == expected.kind && hash == expected.hash => {
                return Ok(LocalState::Clean)
            }
            Some(_) => {}
        }

        // Confirm with a second read; a writer may have been mid-update.
        match self.capture(path, recorded)? {
            None => Ok(LocalState::Missing),
            Some(again) if again.same_identity(expected) => {
                debug!(path = %path, "modification vanished on re-read");
                Ok(LocalState::Clean)
            }
            Some(again) => {
                trace!(
                    path = %path,
                    expected = %expected.kind,
                    live = %again.kind,
                    "path modified"
                );
                Ok(LocalState::Modified(again))
            }
        }
    }

    /// Status of the whole checkout relative to `snapshot`.
    pub fn compute(
        &self,
        snapshot: &Snapshot,
        state: &WorkingState,
        staging: &Staging,
    ) -> StatusResult<StatusReport> {
        let mut report = StatusReport::new();

        for (path, entry) in snapshot.iter() {
            if staging.is_removed(path) {
                report.insert(path.clone(), FileStatus::Removed);
                continue;
            }
            match self.path_status(path, Some(entry), state)? {
                LocalState::Clean => {}
                LocalState::Modified(_) => report.insert(path.clone(), FileStatus::Modified),
                LocalState::Missing | LocalState::Absent => {
                    report.insert(path.clone(), FileStatus::Missing)
                }
                LocalState::Untracked(_) => {}
            }
        }

        let leaves = self.fs.walk_leaves().map_err(StatusError::Walk)?;
        for (path, _) in leaves {
            // Leaves below a tracked file that became a directory are new
            // content in their own right.
            if snapshot.contains(&path) {
                continue;
            }
            let status = if staging.is_added(&path) {
                FileStatus::Added
            } else {
                FileStatus::Unknown
            };
            report.insert(path, status);
        }

        // Staged additions that are no longer on disk.
        for path in staging.added() {
            if !report.contains(path) && !snapshot.contains(path) {
                report.insert(path.clone(), FileStatus::Missing);
            }
        }

        debug!(
            tracked = snapshot.len(),
            changed = report.len(),
            "computed status"
        );
        Ok(report)
    }

    fn capture(
        &self,
        path: &RepoPath,
        recorded: Option<EntryKind>,
    ) -> StatusResult<Option<Entry>> {
        self.retry_once(path, || self.reader.capture(path, recorded))
    }

    /// Run a live read, once more on a non-NotFound failure. A vanished
    /// path reads as `None`.
    fn retry_once<T>(
        &self,
        path: &RepoPath,
        read: impl Fn() -> WorkdirResult<Option<T>>,
    ) -> StatusResult<Option<T>> {
        match read() {
            Ok(value) => Ok(value),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                debug!(path = %path, error = %e, "re-reading after failed read");
                match read() {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(StatusError::from(e)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vwc_workdir::{Materializer, OsFileSystem};

    fn p(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    struct Checkout {
        _dir: tempfile::TempDir,
        fs: OsFileSystem,
        snapshot: Snapshot,
        state: WorkingState,
        policy: SymlinkPolicy,
    }

    fn checkout(policy: SymlinkPolicy, entries: Vec<Entry>) -> Checkout {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFileSystem::new(dir.path(), ".vwc");
        let mut state = WorkingState::default();
        let m = Materializer::new(&fs, policy);
        for entry in &entries {
            state.record(entry.path.clone(), m.realize(entry).unwrap());
        }
        Checkout {
            _dir: dir,
            fs,
            snapshot: Snapshot::new(None, entries),
            state,
            policy,
        }
    }

    fn base_entries() -> Vec<Entry> {
        vec![
            Entry::file(p("adir/hello.txt"), "hola"),
            Entry::symlink(p("symlink"), "adir/hello.txt"),
        ]
    }

    impl Checkout {
        fn status(&self, staging: &Staging) -> StatusReport {
            StatusEngine::new(&self.fs, self.policy)
                .compute(&self.snapshot, &self.state, staging)
                .unwrap()
        }
    }

    #[test]
    fn fresh_quasi_checkout_is_clean() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        assert!(co.status(&Staging::new()).is_clean());
    }

    #[test]
    fn changed_quasi_symlink_is_modified() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        co.fs.write_file(&p("symlink"), b"hello.txt", false).unwrap();
        let report = co.status(&Staging::new());
        assert_eq!(report.get(&p("symlink")), Some(FileStatus::Modified));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn missing_and_unknown() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        co.fs.remove_entry(&p("symlink")).unwrap();
        co.fs.write_file(&p("stray"), b"x", false).unwrap();
        let report = co.status(&Staging::new());
        assert_eq!(report.to_code_map().into_iter().collect::<Vec<_>>(), vec![
            ("stray".to_string(), '?'),
            ("symlink".to_string(), '!'),
        ]);
    }

    #[test]
    fn staged_rename_shows_source_removed_and_destination_added() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        co.fs.rename(&p("symlink"), &p("symbolic_link")).unwrap();
        let mut staging = Staging::new();
        staging.rename(p("symlink"), p("symbolic_link"));

        let report = co.status(&staging);
        assert_eq!(report.get(&p("symlink")), Some(FileStatus::Removed));
        assert_eq!(report.get(&p("symbolic_link")), Some(FileStatus::Added));
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn path_status_reports_untracked_occupant() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        co.fs.write_file(&p("new"), b"mine", false).unwrap();
        let engine = StatusEngine::new(&co.fs, co.policy);
        let state = engine.path_status(&p("new"), None, &co.state).unwrap();
        assert!(matches!(state, LocalState::Untracked(ref e) if &e.content[..] == b"mine"));
        assert_eq!(
            engine.path_status(&p("nothing"), None, &co.state).unwrap(),
            LocalState::Absent
        );
    }

    #[test]
    fn metadata_dir_is_never_reported() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        co.fs.write_file(&p(".vwc/state.json"), b"{}", false).unwrap();
        assert!(co.status(&Staging::new()).is_clean());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_replaced_by_file_is_modified() {
        let co = checkout(SymlinkPolicy::Enabled, base_entries());
        co.fs.remove_entry(&p("symlink")).unwrap();
        co.fs.write_file(&p("symlink"), b"adir/hello.txt", false).unwrap();
        let report = co.status(&Staging::new());
        assert_eq!(report.get(&p("symlink")), Some(FileStatus::Modified));
    }

    #[test]
    fn children_of_file_turned_directory_are_unknown() {
        let co = checkout(SymlinkPolicy::Disabled, base_entries());
        co.fs.remove_entry(&p("symlink")).unwrap();
        co.fs.write_file(&p("symlink/inner.txt"), b"x", false).unwrap();
        let report = co.status(&Staging::new());
        assert_eq!(report.get(&p("symlink")), Some(FileStatus::Modified));
        assert_eq!(report.get(&p("symlink/inner.txt")), Some(FileStatus::Unknown));
        assert_eq!(report.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn retargeted_link_is_modified() {
        let co = checkout(SymlinkPolicy::Enabled, base_entries());
        co.fs.create_symlink(&p("symlink"), b"hello.txt").unwrap();
        let engine = StatusEngine::new(&co.fs, co.policy);
        let expected = co.snapshot.get(&p("symlink"));
        let state = engine.path_status(&p("symlink"), expected, &co.state).unwrap();
        let live = state.live().unwrap();
        assert_eq!(live.kind, EntryKind::Symlink);
        assert_eq!(&live.content[..], b"hello.txt");
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlink_is_a_single_leaf() {
        let mut entries = base_entries();
        entries.push(Entry::symlink(p("dirlink"), "adir"));
        let co = checkout(SymlinkPolicy::Enabled, entries);
        assert!(co.status(&Staging::new()).is_clean());
    }
}
