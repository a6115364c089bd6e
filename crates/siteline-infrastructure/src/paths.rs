//! Centralized path management for Siteline storage files.

use std::path::PathBuf;

use siteline_core::error::{Result, SitelineError};

/// Resolves the on-disk locations Siteline persists to.
///
/// All files live under the platform config directory (for example
/// `~/.config/siteline` on Linux). A base override is supported for tests
/// and portable installs.
pub struct SitelinePaths {
    base: Option<PathBuf>,
}

impl SitelinePaths {
    /// Creates a path resolver, optionally rooted at `base` instead of the
    /// platform config directory.
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }

    /// Returns the Siteline config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform config directory cannot be
    /// determined.
    pub fn config_dir(&self) -> Result<PathBuf> {
        if let Some(base) = &self.base {
            return Ok(base.clone());
        }

        dirs::config_dir()
            .map(|dir| dir.join("siteline"))
            .ok_or_else(|| SitelineError::config("could not determine config directory"))
    }

    /// Returns the path of the persisted site selection file.
    pub fn selection_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("selection.toml"))
    }

    /// Ensures the config directory exists and returns it.
    pub fn ensure_config_dir(&self) -> Result<PathBuf> {
        let dir = self.config_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

impl Default for SitelinePaths {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_override_wins() {
        let paths = SitelinePaths::new(Some(PathBuf::from("/tmp/siteline-test")));
        assert_eq!(
            paths.selection_file().unwrap(),
            PathBuf::from("/tmp/siteline-test/selection.toml")
        );
    }
}
