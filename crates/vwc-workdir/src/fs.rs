//! OS filesystem capability for one checkout directory.
//!
//! Every call takes a [`RepoPath`] relative to the checkout root. Nothing
//! here follows symlinks: `stat_entry` and `walk_leaves` report links as
//! links, and callers that want link-following go through
//! [`Resolver`](crate::Resolver).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use vwc_types::RepoPath;

/// What an on-disk entry is, without following links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskKind {
    File,
    Symlink,
    Directory,
    Other,
}

impl DiskKind {
    fn from_file_type(ft: &fs::FileType) -> Self {
        if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_dir() {
            Self::Directory
        } else if ft.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// `lstat`-style metadata for one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryStat {
    pub kind: DiskKind,
    pub size: u64,
    /// Owner-executable bit. Always `false` where the platform has none.
    pub executable: bool,
}

impl EntryStat {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        Self {
            kind: DiskKind::from_file_type(&meta.file_type()),
            size: meta.len(),
            executable: is_executable(meta),
        }
    }
}

/// One child of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: DiskKind,
}

/// Filesystem operations the working copy performs on its checkout.
///
/// Writes are atomic per path: readers see either the old entry or the
/// new one, never a partial file or a missing path in between.
pub trait FileSystem: Send + Sync {
    fn root(&self) -> &Path;

    /// Metadata of `path` without following a final symlink. `None` if
    /// nothing exists there.
    fn stat_entry(&self, path: &RepoPath) -> io::Result<Option<EntryStat>>;

    fn read_file(&self, path: &RepoPath) -> io::Result<Vec<u8>>;

    /// Raw target text of a true symlink.
    fn read_link(&self, path: &RepoPath) -> io::Result<Vec<u8>>;

    fn write_file(&self, path: &RepoPath, content: &[u8], executable: bool) -> io::Result<()>;

    fn create_symlink(&self, path: &RepoPath, target: &[u8]) -> io::Result<()>;

    fn create_dir(&self, path: &RepoPath) -> io::Result<()>;

    /// Remove a file, link or empty directory, then prune parent
    /// directories left empty. Returns `false` if nothing was there.
    fn remove_entry(&self, path: &RepoPath) -> io::Result<bool>;

    fn rename(&self, from: &RepoPath, to: &RepoPath) -> io::Result<()>;

    /// Children of a directory, sorted by name.
    fn list_directory(&self, path: &RepoPath) -> io::Result<Vec<DirEntry>>;

    /// Every non-directory entry under the root in path order. Symlinks to
    /// directories are leaves and are not descended into.
    fn walk_leaves(&self) -> io::Result<Vec<(RepoPath, EntryStat)>>;
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// [`FileSystem`] backed by the real OS filesystem.
#[derive(Clone, Debug)]
pub struct OsFileSystem {
    root: PathBuf,
    metadata_dir: String,
}

impl OsFileSystem {
    /// `metadata_dir` is the name of the top-level directory holding
    /// working copy state; it is hidden from listings and walks.
    pub fn new(root: impl Into<PathBuf>, metadata_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            metadata_dir: metadata_dir.into(),
        }
    }

    pub fn metadata_dir(&self) -> &str {
        &self.metadata_dir
    }

    fn abs(&self, path: &RepoPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    /// Create every missing ancestor of `path` as a directory. An ancestor
    /// that exists as anything other than a real directory is an error.
    fn ensure_parent_dirs(&self, path: &RepoPath) -> io::Result<()> {
        let mut current = self.root.clone();
        let components: Vec<&str> = path.components().collect();
        let Some((_, parents)) = components.split_last() else {
            return Ok(());
        };
        for component in parents {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(io::Error::other(format!(
                        "{} exists and is not a directory",
                        current.display()
                    )))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(&current)?,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Clear `dest` if it is a real directory so a rename can replace it.
    fn clear_directory_at(dest: &Path) -> io::Result<()> {
        match fs::symlink_metadata(dest) {
            Ok(meta) if meta.is_dir() => fs::remove_dir(dest),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Directory for in-flight writes. It sits inside the metadata
    /// directory, so walks and listings never see half-made entries, and
    /// on the checkout's filesystem, so the final rename stays atomic.
    fn scratch_dir(&self) -> io::Result<PathBuf> {
        let dir = self.root.join(&self.metadata_dir);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn scratch_link(&self) -> io::Result<PathBuf> {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .scratch_dir()?
            .join(format!("link-{}-{n}", std::process::id())))
    }

    /// Whether every ancestor of `path` is a real directory. A link or a
    /// file part-way down means `path` names nothing inside the checkout.
    fn parents_are_directories(&self, path: &RepoPath) -> io::Result<bool> {
        let mut current = self.root.clone();
        let components: Vec<&str> = path.components().collect();
        let Some((_, parents)) = components.split_last() else {
            return Ok(true);
        };
        for component in parents {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn prune_empty_parents(&self, path: &RepoPath) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.is_root() {
                break;
            }
            if fs::remove_dir(self.abs(&dir)).is_err() {
                break;
            }
            debug!(dir = %dir, "pruned empty directory");
            parent = dir.parent();
        }
    }

    fn relative(&self, abs: &Path) -> io::Result<RepoPath> {
        let rel = abs.strip_prefix(&self.root).map_err(io::Error::other)?;
        let mut components = Vec::new();
        for c in rel.components() {
            let s = c.as_os_str().to_str().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non UTF-8 file name under {}", self.root.display()),
                )
            })?;
            components.push(s.to_string());
        }
        RepoPath::from_components(components)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl FileSystem for OsFileSystem {
    fn root(&self) -> &Path {
        &self.root
    }

    fn stat_entry(&self, path: &RepoPath) -> io::Result<Option<EntryStat>> {
        match fs::symlink_metadata(self.abs(path)) {
            Ok(meta) => Ok(Some(EntryStat::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound || is_not_a_directory(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_file(&self, path: &RepoPath) -> io::Result<Vec<u8>> {
        fs::read(self.abs(path))
    }

    fn read_link(&self, path: &RepoPath) -> io::Result<Vec<u8>> {
        let target = fs::read_link(self.abs(path))?;
        Ok(link_target_bytes(&target))
    }

    fn write_file(&self, path: &RepoPath, content: &[u8], executable: bool) -> io::Result<()> {
        self.ensure_parent_dirs(path)?;
        let dest = self.abs(path);
        let mut tmp = tempfile::Builder::new()
            .prefix("write-")
            .tempfile_in(self.scratch_dir()?)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        set_executable(tmp.path(), executable)?;
        Self::clear_directory_at(&dest)?;
        tmp.persist(&dest).map_err(|e| e.error)?;
        Ok(())
    }

    fn create_symlink(&self, path: &RepoPath, target: &[u8]) -> io::Result<()> {
        self.ensure_parent_dirs(path)?;
        let dest = self.abs(path);
        let tmp = self.scratch_link()?;
        make_symlink(target, &tmp)?;
        Self::clear_directory_at(&dest)?;
        if let Err(e) = fs::rename(&tmp, &dest) {
            let _ = remove_link(&tmp);
            return Err(e);
        }
        Ok(())
    }

    fn create_dir(&self, path: &RepoPath) -> io::Result<()> {
        self.ensure_parent_dirs(path)?;
        match fs::create_dir(self.abs(path)) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match fs::symlink_metadata(self.abs(path))? {
                    meta if meta.is_dir() => Ok(()),
                    _ => Err(e),
                }
            }
            other => other,
        }
    }

    fn remove_entry(&self, path: &RepoPath) -> io::Result<bool> {
        if !self.parents_are_directories(path)? {
            warn!(path = %path, "not removing below a non-directory ancestor");
            return Ok(false);
        }
        let abs = self.abs(path);
        let meta = match fs::symlink_metadata(&abs) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if meta.is_dir() {
            fs::remove_dir(&abs)?;
        } else if meta.file_type().is_symlink() {
            remove_link(&abs)?;
        } else {
            fs::remove_file(&abs)?;
        }
        self.prune_empty_parents(path);
        Ok(true)
    }

    fn rename(&self, from: &RepoPath, to: &RepoPath) -> io::Result<()> {
        if !self.parents_are_directories(from)? {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{from} is not inside a real directory"),
            ));
        }
        self.ensure_parent_dirs(to)?;
        fs::rename(self.abs(from), self.abs(to))?;
        self.prune_empty_parents(from);
        Ok(())
    }

    fn list_directory(&self, path: &RepoPath) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for item in fs::read_dir(self.abs(path))? {
            let item = item?;
            let name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "skipping non UTF-8 file name");
                    continue;
                }
            };
            if path.is_root() && name == self.metadata_dir {
                continue;
            }
            out.push(DirEntry {
                name,
                kind: DiskKind::from_file_type(&item.file_type()?),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn walk_leaves(&self) -> io::Result<Vec<(RepoPath, EntryStat)>> {
        let metadata_dir = self.metadata_dir.as_str();
        let walker = walkdir::WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == metadata_dir));

        let mut out = Vec::new();
        for item in walker {
            // An entry removed between readdir and stat is simply gone.
            let item = match item {
                Ok(item) => item,
                Err(e) if vanished(&e) => continue,
                Err(e) => return Err(io::Error::from(e)),
            };
            let meta = match item.metadata() {
                Ok(meta) => meta,
                Err(e) if vanished(&e) => {
                    debug!(path = %item.path().display(), "entry vanished during walk");
                    continue;
                }
                Err(e) => return Err(io::Error::from(e)),
            };
            if meta.is_dir() {
                continue;
            }
            let path = match self.relative(item.path()) {
                Ok(path) => path,
                Err(e) => {
                    warn!(path = %item.path().display(), error = %e, "skipping untrackable path");
                    continue;
                }
            };
            out.push((path, EntryStat::from_metadata(&meta)));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// A parent component is a file, so nothing can exist below it.
fn is_not_a_directory(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotADirectory
}

fn vanished(e: &walkdir::Error) -> bool {
    e.io_error()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.is_file() && meta.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn link_target_bytes(target: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    target.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn link_target_bytes(target: &Path) -> Vec<u8> {
    target.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn make_symlink(target: &[u8], link: &Path) -> io::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    std::os::unix::fs::symlink(OsStr::from_bytes(target), link)
}

#[cfg(windows)]
fn make_symlink(target: &[u8], link: &Path) -> io::Result<()> {
    let target = PathBuf::from(String::from_utf8_lossy(target).into_owned());
    let points_at_dir = link
        .parent()
        .map(|dir| dir.join(&target).is_dir())
        .unwrap_or(false);
    if points_at_dir {
        std::os::windows::fs::symlink_dir(&target, link)
    } else {
        std::os::windows::fs::symlink_file(&target, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_target: &[u8], _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

#[cfg(windows)]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link).or_else(|_| fs::remove_dir(link))
}

#[cfg(not(windows))]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}
