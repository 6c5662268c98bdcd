use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vwc_workdir::{SymlinkPolicy, DEFAULT_MAX_HOPS};

use crate::error::{CheckoutError, CheckoutResult};

/// Settings for one checkout.
///
/// The symlink policy is read once when the working copy is opened and
/// never changes for that instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    pub symlink_policy: SymlinkPolicy,
    /// Name of the directory under the checkout root that holds working
    /// copy state. Never reported by status.
    pub metadata_dir: String,
    /// Upper bound on links followed by one resolution.
    pub max_symlink_hops: usize,
    /// Extra attempts for a materialization that fails with a transient
    /// I/O error.
    pub transient_retries: usize,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            symlink_policy: SymlinkPolicy::platform_default(),
            metadata_dir: ".vwc".to_string(),
            max_symlink_hops: DEFAULT_MAX_HOPS,
            transient_retries: 1,
        }
    }
}

impl CheckoutConfig {
    pub fn with_policy(policy: SymlinkPolicy) -> Self {
        Self {
            symlink_policy: policy,
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> CheckoutResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CheckoutError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CheckoutResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CheckoutError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> CheckoutResult<String> {
        toml::to_string(self).map_err(|e| CheckoutError::Config(e.to_string()))
    }

    pub fn metadata_path(&self, root: &Path) -> PathBuf {
        root.join(&self.metadata_dir)
    }

    pub fn state_file(&self, root: &Path) -> PathBuf {
        self.metadata_path(root).join("state.json")
    }

    pub fn staging_file(&self, root: &Path) -> PathBuf {
        self.metadata_path(root).join("staging.json")
    }

    pub(crate) fn validate(&self) -> CheckoutResult<()> {
        let dir = self.metadata_dir.as_str();
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains(['/', '\\']) {
            return Err(CheckoutError::Config(format!(
                "metadata_dir must be a single directory name, got {dir:?}"
            )));
        }
        if self.max_symlink_hops == 0 {
            return Err(CheckoutError::Config(
                "max_symlink_hops must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
