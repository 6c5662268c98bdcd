use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Semantic kind of a tracked entry.
///
/// This is commit-snapshot truth. It is never derived from how the entry
/// happens to be materialized: a symlink checked out as a plain file under a
/// disabled symlink policy is still `Symlink`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000). Content is the target text.
    Symlink,
    /// Directory (0o040000).
    Directory,
}

impl EntryKind {
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Directory => 0o040000,
        }
    }

    pub fn from_mode_bits(bits: u32) -> Result<Self, TypeError> {
        match bits {
            0o100644 => Ok(Self::Regular),
            0o100755 => Ok(Self::Executable),
            0o120000 => Ok(Self::Symlink),
            0o040000 => Ok(Self::Directory),
            other => Err(TypeError::UnknownMode(other)),
        }
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink)
    }

    /// Regular or executable file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}
