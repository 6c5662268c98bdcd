//! Reading live entries back from the checkout.
//!
//! The live side of content hashing must agree with the snapshot side: a
//! symlink hashes as its target text whether it is a real link or a
//! quasi-symlink file. [`LiveReader::read_target_text`] is the single place
//! that knows both forms.

use vwc_crypto::ContentHasher;
use vwc_store::Entry;
use vwc_types::{EntryKind, ObjectId, RepoPath};

use crate::error::{WorkdirError, WorkdirResult};
use crate::fs::{DiskKind, EntryStat, FileSystem};
use crate::policy::SymlinkPolicy;

const EXEC_BIT_SUPPORTED: bool = cfg!(unix);

/// Captures live entries, classifying them with the recorded working
/// state and the symlink policy.
pub struct LiveReader<'a> {
    fs: &'a dyn FileSystem,
    policy: SymlinkPolicy,
}

impl<'a> LiveReader<'a> {
    pub fn new(fs: &'a dyn FileSystem, policy: SymlinkPolicy) -> Self {
        Self { fs, policy }
    }

    /// The kind a live entry represents.
    ///
    /// A real link is always a symlink. A regular file is a symlink only
    /// when links are disabled and the working state recorded `path` as
    /// one; otherwise it is regular or executable by its exec bit.
    pub fn live_kind(&self, stat: &EntryStat, recorded: Option<EntryKind>) -> Option<EntryKind> {
        match stat.kind {
            DiskKind::Symlink => Some(EntryKind::Symlink),
            DiskKind::Directory => Some(EntryKind::Directory),
            DiskKind::Other => None,
            DiskKind::File => {
                if self.policy == SymlinkPolicy::Disabled && recorded == Some(EntryKind::Symlink) {
                    Some(EntryKind::Symlink)
                } else if stat.executable
                    || (!EXEC_BIT_SUPPORTED && recorded == Some(EntryKind::Executable))
                {
                    Some(EntryKind::Executable)
                } else {
                    Some(EntryKind::Regular)
                }
            }
        }
    }

    /// Target text of a symlink in either form: `readlink` for a real
    /// link, file bytes for a quasi-symlink.
    pub fn read_target_text(&self, path: &RepoPath) -> WorkdirResult<Vec<u8>> {
        let stat = self
            .fs
            .stat_entry(path)
            .map_err(|e| WorkdirError::io(path, e))?
            .ok_or_else(|| WorkdirError::io(path, std::io::ErrorKind::NotFound.into()))?;
        self.read_content(path, &stat)
    }

    fn read_content(&self, path: &RepoPath, stat: &EntryStat) -> WorkdirResult<Vec<u8>> {
        let result = match stat.kind {
            DiskKind::Symlink => self.fs.read_link(path),
            DiskKind::File => self.fs.read_file(path),
            DiskKind::Directory => Ok(Vec::new()),
            DiskKind::Other => return Err(WorkdirError::Unsupported(path.clone())),
        };
        result.map_err(|e| WorkdirError::io(path, e))
    }

    /// Capture the live entry at `path`, or `None` if nothing is there.
    pub fn capture(
        &self,
        path: &RepoPath,
        recorded: Option<EntryKind>,
    ) -> WorkdirResult<Option<Entry>> {
        let stat = self
            .fs
            .stat_entry(path)
            .map_err(|e| WorkdirError::io(path, e))?;
        match stat {
            Some(stat) => self.capture_stat(path, &stat, recorded).map(Some),
            None => Ok(None),
        }
    }

    /// Kind and content hash of the live entry, without keeping its bytes.
    pub fn live_hash(
        &self,
        path: &RepoPath,
        recorded: Option<EntryKind>,
    ) -> WorkdirResult<Option<(EntryKind, ObjectId)>> {
        let Some(stat) = self
            .fs
            .stat_entry(path)
            .map_err(|e| WorkdirError::io(path, e))?
        else {
            return Ok(None);
        };
        let kind = self
            .live_kind(&stat, recorded)
            .ok_or_else(|| WorkdirError::Unsupported(path.clone()))?;
        let content = self.read_content(path, &stat)?;
        Ok(Some((kind, ContentHasher::hash_entry(kind, &content))))
    }

    /// Capture with metadata already in hand, as a directory walk has it.
    pub fn capture_stat(
        &self,
        path: &RepoPath,
        stat: &EntryStat,
        recorded: Option<EntryKind>,
    ) -> WorkdirResult<Entry> {
        let kind = self
            .live_kind(stat, recorded)
            .ok_or_else(|| WorkdirError::Unsupported(path.clone()))?;
        let content = self.read_content(path, stat)?;
        Ok(Entry::new(path.clone(), kind, content))
    }
}
