//! Bounded symlink resolution.
//!
//! The resolver walks a path one component at a time against the live
//! checkout. Each symlink met on the way is replaced by its target text,
//! interpreted relative to the link's directory. The walk keeps a visited
//! set of (link, remaining path) states and a hop counter, so every query
//! terminates: at a terminal entry, at a missing component, or with an
//! [`UnresolvableReason`].
//!
//! Only real links are followed. A quasi-symlink is an ordinary file here.

use std::collections::{HashSet, VecDeque};

use tracing::trace;
use vwc_types::RepoPath;

use crate::error::{ResolveError, UnresolvableReason};
use crate::fs::{DiskKind, FileSystem};

/// Same bound as Linux `MAXSYMLINKS`.
pub const DEFAULT_MAX_HOPS: usize = 40;

/// What a path resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
    /// Nothing at the end of the chain (including dangling links).
    Missing,
    /// Cycle, hop bound, or a target outside the checkout.
    Unresolvable,
    /// Sockets, fifos and other unsupported entries.
    Other,
}

pub struct Resolver<'a> {
    fs: &'a dyn FileSystem,
    max_hops: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(fs: &'a dyn FileSystem, max_hops: usize) -> Self {
        Self { fs, max_hops }
    }

    /// Follow every link, including a final one, and return the
    /// link-free path that `path` names.
    pub fn resolve(&self, path: &RepoPath) -> Result<RepoPath, ResolveError> {
        self.walk(path, true).map(|(resolved, _)| resolved)
    }

    pub fn node_type(&self, path: &RepoPath) -> NodeType {
        match self.walk(path, true) {
            Ok((_, DiskKind::File)) => NodeType::File,
            Ok((_, DiskKind::Directory)) => NodeType::Directory,
            Ok((_, DiskKind::Symlink | DiskKind::Other)) => NodeType::Other,
            Err(ResolveError::NotFound(_) | ResolveError::NotADirectory(_)) => NodeType::Missing,
            Err(ResolveError::Unresolvable { .. }) => NodeType::Unresolvable,
            Err(_) => NodeType::Other,
        }
    }

    pub fn is_file(&self, path: &RepoPath) -> bool {
        self.node_type(path) == NodeType::File
    }

    pub fn is_dir(&self, path: &RepoPath) -> bool {
        self.node_type(path) == NodeType::Directory
    }

    /// Contents of the file `path` names after following links.
    pub fn read_file(&self, path: &RepoPath) -> Result<Vec<u8>, ResolveError> {
        let (resolved, kind) = self.walk(path, true)?;
        match kind {
            DiskKind::File => self.fs.read_file(&resolved).map_err(|source| ResolveError::Io {
                path: path.clone(),
                source,
            }),
            DiskKind::Directory => Err(ResolveError::IsADirectory(path.clone())),
            DiskKind::Symlink | DiskKind::Other => Err(ResolveError::Io {
                path: path.clone(),
                source: std::io::Error::other("not a regular file"),
            }),
        }
    }

    /// Target text of the link at `path`. Links in the parent directories
    /// are followed; the final component is not.
    pub fn read_link(&self, path: &RepoPath) -> Result<Vec<u8>, ResolveError> {
        let (resolved, kind) = self.walk(path, false)?;
        if kind != DiskKind::Symlink {
            return Err(ResolveError::NotASymlink(path.clone()));
        }
        self.fs.read_link(&resolved).map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })
    }

    fn walk(&self, path: &RepoPath, follow_final: bool) -> Result<(RepoPath, DiskKind), ResolveError> {
        let unresolvable = |reason| ResolveError::Unresolvable {
            path: path.clone(),
            reason,
        };
        let io_err = |source| ResolveError::Io {
            path: path.clone(),
            source,
        };

        let mut pending: VecDeque<String> = path.components().map(str::to_owned).collect();
        let mut resolved: Vec<String> = Vec::new();
        let mut visited: HashSet<(RepoPath, Vec<String>)> = HashSet::new();
        let mut hops = 0usize;

        while let Some(component) = pending.pop_front() {
            match component.as_str() {
                "" | "." => continue,
                ".." => {
                    if resolved.pop().is_none() {
                        return Err(unresolvable(UnresolvableReason::EscapesRoot {
                            target: path.to_string(),
                        }));
                    }
                    continue;
                }
                _ => resolved.push(component),
            }

            let current = RepoPath::from_components(&resolved)
                .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
            let stat = self
                .fs
                .stat_entry(&current)
                .map_err(io_err)?
                .ok_or_else(|| ResolveError::NotFound(path.clone()))?;
            let is_final = pending.is_empty();

            match stat.kind {
                DiskKind::Symlink if follow_final || !is_final => {
                    let state = (current.clone(), pending.iter().cloned().collect::<Vec<_>>());
                    if !visited.insert(state) {
                        return Err(unresolvable(UnresolvableReason::Cycle { revisited: current }));
                    }
                    hops += 1;
                    if hops > self.max_hops {
                        return Err(unresolvable(UnresolvableReason::HopLimit {
                            hops: self.max_hops,
                        }));
                    }
                    let raw = self.fs.read_link(&current).map_err(io_err)?;
                    let target = String::from_utf8(raw)
                        .map_err(|_| unresolvable(UnresolvableReason::InvalidTarget))?;
                    if is_absolute_target(&target) {
                        return Err(unresolvable(UnresolvableReason::EscapesRoot { target }));
                    }
                    trace!(link = %current, target = %target, "following symlink");
                    resolved.pop();
                    for part in split_target(&target).into_iter().rev() {
                        pending.push_front(part.to_owned());
                    }
                }
                DiskKind::Directory | DiskKind::Symlink => {}
                _ if !is_final => return Err(ResolveError::NotADirectory(current)),
                _ => {}
            }
        }

        let resolved = RepoPath::from_components(&resolved)
            .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
        if resolved.is_root() {
            return Ok((resolved, DiskKind::Directory));
        }
        // `..` may have moved the walk since the last stat.
        let kind = self
            .fs
            .stat_entry(&resolved)
            .map_err(io_err)?
            .map(|s| s.kind)
            .ok_or_else(|| ResolveError::NotFound(path.clone()))?;
        Ok((resolved, kind))
    }
}

fn is_absolute_target(target: &str) -> bool {
    if target.starts_with('/') {
        return true;
    }
    if cfg!(windows) {
        let bytes = target.as_bytes();
        return target.starts_with('\\') || (bytes.len() >= 2 && bytes[1] == b':');
    }
    false
}

fn split_target(target: &str) -> Vec<&str> {
    target
        .split(|c: char| c == '/' || (cfg!(windows) && c == '\\'))
        .collect()
}
