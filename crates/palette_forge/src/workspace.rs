//! Scoped per-theme staging directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;
use crate::util::ensure_dir;

/// Exclusively owned staging directory, deleted when dropped.
///
/// Dropping happens on every exit path of the owning build, including early
/// `?` returns and unwinding panics, so no staged state outlives the build.
#[derive(Debug)]
pub struct BuildWorkspace {
    dir: TempDir,
}

impl BuildWorkspace {
    /// Creates a workspace under the system temp directory, or under `parent` when given.
    pub fn create(theme_id: &str, parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("palette_forge-{theme_id}-");
        builder.prefix(&prefix);
        let dir = match parent {
            Some(parent) => {
                ensure_dir(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(theme = theme_id, path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }
}
