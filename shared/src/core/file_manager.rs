//! File manager interface for resfs
//!
//! Every backend (zip archive, plain directory, in-memory map) and every
//! composite (localized overlay, prefix wrapper) implements [`FileManager`],
//! so they can be stacked freely behind a `Box<dyn FileManager>`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::FileResult;

/// Outcome of a successful [`FileManager::enumerate_files`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerateStatus {
    /// Every entry was reported
    Completed,
    /// The callback returned `false` and enumeration stopped early
    Canceled,
}

/// Trait for loading and storing resource files
///
/// File names are '/'-separated paths relative to the manager's base.
/// Operations take `&mut self` because backends such as the zip manager
/// switch internal handles while serving reads.
pub trait FileManager: fmt::Debug + Send {
    /// Whether the manager was initialized and can serve requests
    fn is_valid(&self) -> bool;

    /// Initialize the manager with a base path
    ///
    /// # Arguments
    /// * `base_path` - Archive file or directory the manager is rooted at
    /// * `create` - Create the backing store when it does not exist yet
    fn init(&mut self, base_path: &Path, create: bool) -> FileResult<()>;

    /// Read the whole contents of a file
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - File contents
    /// * `Err(FileError)` - If the file is missing or unreadable
    fn read_file(&mut self, file: &str) -> FileResult<Vec<u8>>;

    /// Write a file, replacing it only when `overwrite` is set
    ///
    /// # Returns
    /// * `Ok(())` - If write was successful
    /// * `Err(FileError::AlreadyExists)` - If the file exists and `overwrite` is false
    fn write_file(&mut self, file: &str, data: &[u8], overwrite: bool) -> FileResult<()>;

    /// Remove a file
    fn remove_file(&mut self, file: &str) -> FileResult<()>;

    /// Extract a file to the real filesystem
    ///
    /// # Arguments
    /// * `file` - File to extract
    /// * `into_file` - Target path; when `None` the file is placed under a
    ///   scratch directory owned by the manager
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Where the extracted copy lives
    fn extract_file(&mut self, file: &str, into_file: Option<&Path>) -> FileResult<PathBuf>;

    /// Whether a file exists
    fn file_exists(&mut self, file: &str) -> bool;

    /// Whether the file can be opened directly on the host filesystem
    /// through [`FileManager::full_path`]
    fn is_directly_accessible(&self, file: &str) -> bool;

    /// Host path of a file, meaningful for logging even when the file is not
    /// directly accessible. An empty `file` yields the base path.
    fn full_path(&self, file: &str) -> Option<PathBuf>;

    /// Last modification time of a file
    fn last_modified_time(&mut self, file: &str) -> FileResult<SystemTime>;

    /// Report every file under `dir` to `callback`, as paths relative to `dir`
    ///
    /// Returning `false` from the callback stops the enumeration and yields
    /// [`EnumerateStatus::Canceled`].
    fn enumerate_files(
        &mut self,
        dir: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus>;

    /// Collect every file under `dir`
    fn list_files(&mut self, dir: &str) -> FileResult<Vec<String>> {
        let mut files = Vec::new();
        self.enumerate_files(dir, &mut |name: &str| {
            files.push(name.to_string());
            true
        })?;
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryFileManager;

    #[test]
    fn test_list_files_collects_everything() {
        let mut fm = MemoryFileManager::new();
        fm.write_file("a.txt", b"a", false).unwrap();
        fm.write_file("dir/b.txt", b"b", false).unwrap();

        let mut files = fm.list_files("").unwrap();
        files.sort();
        assert_eq!(files, vec!["a.txt".to_string(), "dir/b.txt".to_string()]);
    }

    #[test]
    fn test_trait_object_usage() {
        let mut boxed: Box<dyn FileManager> = Box::new(MemoryFileManager::new());
        assert!(boxed.is_valid());
        boxed.write_file("main.xml", b"<view/>", false).unwrap();
        assert!(boxed.file_exists("main.xml"));

        let mut seen = 0;
        let status = boxed
            .enumerate_files("", &mut |_| {
                seen += 1;
                false
            })
            .unwrap();
        assert_eq!(status, EnumerateStatus::Canceled);
        assert_eq!(seen, 1);
    }
}
