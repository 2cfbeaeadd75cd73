//! In-memory file manager
//!
//! Keeps files in a sorted map. Used for tests and for ephemeral overlays
//! that never touch the disk until a file is extracted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::core::errors::{FileError, FileResult};
use crate::core::file_manager::{EnumerateStatus, FileManager};
use crate::core::path::{normalize_file_path, relative_file_path};
use crate::core::scratch::ScratchDir;

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    modified: SystemTime,
}

/// File manager backed by a map of relative paths to contents
#[derive(Debug)]
pub struct MemoryFileManager {
    label: PathBuf,
    files: BTreeMap<String, MemoryEntry>,
    read_only: bool,
    scratch: ScratchDir,
}

impl MemoryFileManager {
    /// Create an empty, writable manager. It is valid right away.
    pub fn new() -> Self {
        Self {
            label: PathBuf::from("memory"),
            files: BTreeMap::new(),
            read_only: false,
            scratch: ScratchDir::new(),
        }
    }

    /// Create a manager that rejects writes and removals
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::new()
        }
    }

    /// Seed a file without going through the write checks
    pub fn add_file<P: AsRef<str>>(&mut self, path: P, data: impl Into<Vec<u8>>) {
        self.files.insert(
            normalize_file_path(path.as_ref()),
            MemoryEntry {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
    }

    fn key(file: &str) -> FileResult<String> {
        relative_file_path(file).ok_or_else(|| FileError::invalid_path(file))
    }

    fn entry(&self, file: &str) -> FileResult<&MemoryEntry> {
        let key = Self::key(file)?;
        self.files.get(&key).ok_or(FileError::NotFound { path: key })
    }
}

impl Default for MemoryFileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileManager for MemoryFileManager {
    fn is_valid(&self) -> bool {
        true
    }

    fn init(&mut self, base_path: &Path, _create: bool) -> FileResult<()> {
        self.label = base_path.to_path_buf();
        self.files.clear();
        self.scratch.clear();
        Ok(())
    }

    fn read_file(&mut self, file: &str) -> FileResult<Vec<u8>> {
        self.entry(file).map(|entry| entry.data.clone())
    }

    fn write_file(&mut self, file: &str, data: &[u8], overwrite: bool) -> FileResult<()> {
        let key = Self::key(file)?;
        if self.read_only {
            return Err(FileError::PermissionDenied { path: key });
        }
        if !overwrite && self.files.contains_key(&key) {
            debug!("Refusing to overwrite {} in memory", key);
            return Err(FileError::AlreadyExists { path: key });
        }

        self.files.insert(
            key,
            MemoryEntry {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn remove_file(&mut self, file: &str) -> FileResult<()> {
        let key = Self::key(file)?;
        if self.read_only {
            return Err(FileError::PermissionDenied { path: key });
        }
        match self.files.remove(&key) {
            Some(_) => Ok(()),
            None => Err(FileError::NotFound { path: key }),
        }
    }

    fn extract_file(&mut self, file: &str, into_file: Option<&Path>) -> FileResult<PathBuf> {
        let key = Self::key(file)?;
        let data = self.entry(&key)?.data.clone();

        let target = match into_file {
            Some(path) => path.to_path_buf(),
            None => self.scratch.ensure(&self.label)?.join(&key),
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FileError::from_io(e, parent))?;
        }
        std::fs::write(&target, data).map_err(|e| FileError::from_io(e, &target))?;
        Ok(target)
    }

    fn file_exists(&mut self, file: &str) -> bool {
        self.entry(file).is_ok()
    }

    fn is_directly_accessible(&self, _file: &str) -> bool {
        false
    }

    fn full_path(&self, file: &str) -> Option<PathBuf> {
        if file.is_empty() {
            return Some(self.label.clone());
        }
        relative_file_path(file).map(|key| self.label.join(key))
    }

    fn last_modified_time(&mut self, file: &str) -> FileResult<SystemTime> {
        self.entry(file).map(|entry| entry.modified)
    }

    fn enumerate_files(
        &mut self,
        dir: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus> {
        let dir = normalize_file_path(dir);
        let dir_prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        for key in self.files.keys() {
            if let Some(name) = key.strip_prefix(&dir_prefix) {
                if !callback(name) {
                    return Ok(EnumerateStatus::Canceled);
                }
            }
        }
        Ok(EnumerateStatus::Completed)
    }
}
