//! Lazily created scratch directory for extracted files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::core::errors::{FileError, FileResult};

/// Temporary directory owned by a file manager; removed on drop
#[derive(Debug, Default)]
pub struct ScratchDir {
    dir: Option<TempDir>,
}

impl ScratchDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the scratch directory, creating it on first use.
    ///
    /// The directory name starts with the last component of `base` so that
    /// leftovers can be traced back to the manager that created them.
    pub fn ensure(&mut self, base: &Path) -> FileResult<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.path().to_path_buf());
        }

        let label = base
            .file_name()
            .map(|name| format!("{}-", name.to_string_lossy()))
            .unwrap_or_else(|| "resfs-".to_string());

        let dir = tempfile::Builder::new()
            .prefix(&label)
            .tempdir()
            .map_err(|e| FileError::Internal {
                message: format!("Failed to create scratch directory: {}", e),
            })?;
        debug!("Created scratch directory {}", dir.path().display());

        let path = dir.path().to_path_buf();
        self.dir = Some(dir);
        Ok(path)
    }

    /// Delete the scratch directory now instead of on drop.
    pub fn clear(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                debug!("Failed to remove scratch directory {}: {}", path.display(), e);
            }
        }
    }
}
