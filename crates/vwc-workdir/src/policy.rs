use serde::{Deserialize, Serialize};

/// How symlink entries are realized in one checkout.
///
/// The policy is fixed when the checkout is opened. Changing it means
/// tearing the working copy down and checking it out again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkPolicy {
    /// Symlinks become real OS symbolic links.
    Enabled,
    /// Symlinks become quasi-symlinks: regular files holding the target text.
    Disabled,
}

impl SymlinkPolicy {
    /// Enabled everywhere except Windows, where creating links usually
    /// needs elevated privileges.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl Default for SymlinkPolicy {
    fn default() -> Self {
        Self::platform_default()
    }
}
