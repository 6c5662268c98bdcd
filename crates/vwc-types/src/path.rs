//! Repository-relative paths.
//!
//! A [`RepoPath`] is an ordered sequence of components joined with `/`.
//! The empty path denotes the checkout root. Components are never empty,
//! `.` or `..`, so a `RepoPath` can always be joined onto a root directory
//! without escaping it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A validated path relative to the working-copy root.
///
/// Ordering is plain byte-wise string ordering, which is the order the
/// update engine processes paths in.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// The checkout root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and validate a `/`-separated path.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        if path.is_empty() {
            return Ok(Self::root());
        }
        for component in path.split('/') {
            validate_component(&path, component)?;
        }
        Ok(Self(path))
    }

    /// Build a path from individual components.
    pub fn from_components<I, S>(components: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::new();
        for component in components {
            let component = component.as_ref();
            validate_component(component, component)?;
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(component);
        }
        Ok(Self(out))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Number of components; zero for the root.
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        })
    }

    /// Append a single component.
    pub fn join(&self, component: &str) -> Result<RepoPath, TypeError> {
        validate_component(component, component)?;
        if self.is_root() {
            Ok(Self(component.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, component)))
        }
    }

    /// Returns `true` if `self` is `other` or lies underneath it.
    pub fn starts_with(&self, other: &RepoPath) -> bool {
        if other.is_root() {
            return true;
        }
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'/'))
    }

    /// Native path of this entry under `root`.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for component in self.components() {
            out.push(component);
        }
        out
    }
}

fn validate_component(path: &str, component: &str) -> Result<(), TypeError> {
    let reason = if component.is_empty() {
        "empty component"
    } else if component == "." || component == ".." {
        "relative component"
    } else if component.contains('/') {
        "component contains a separator"
    } else if component.contains('\0') {
        "component contains NUL"
    } else {
        return Ok(());
    };
    Err(TypeError::InvalidPath {
        path: path.to_string(),
        reason,
    })
}

impl fmt::Debug for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoPath({:?})", self.0)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RepoPath {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
