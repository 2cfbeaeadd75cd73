//! Directory-backed file manager
//!
//! Serves files from a base directory on the host filesystem. File names
//! are resolved relative to the base and may never climb out of it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::core::errors::{FileError, FileResult};
use crate::core::file_manager::{EnumerateStatus, FileManager};
use crate::core::path::{absolute_path, build_file_path, normalize_file_path, relative_file_path};
use crate::core::scratch::ScratchDir;
use crate::MAX_FILE_SIZE;

/// File manager rooted at a directory
#[derive(Debug, Default)]
pub struct DirFileManager {
    base_path: Option<PathBuf>,
    scratch: ScratchDir,
}

impl DirFileManager {
    /// Create an uninitialized manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize a manager in one step
    pub fn create(base_path: &Path, create: bool) -> FileResult<Self> {
        let mut manager = Self::new();
        manager.init(base_path, create)?;
        Ok(manager)
    }

    /// The absolute base directory, once initialized
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Resolve a file name to a host path under the base directory
    fn resolve(&self, file: &str) -> FileResult<PathBuf> {
        let base = self.base_path.as_ref().ok_or_else(|| {
            debug!("Directory file manager used before init");
            FileError::NotInitialized
        })?;

        let relative = relative_file_path(file).ok_or_else(|| {
            debug!("Invalid file path for {}: {:?}", base.display(), file);
            FileError::invalid_path(file)
        })?;
        Ok(base.join(relative))
    }

    fn walk(
        dir: &Path,
        relative: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus> {
        let mut entries = fs::read_dir(dir)
            .map_err(|e| FileError::from_io(e, dir))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FileError::from_io(e, dir))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }

            let path = build_file_path(relative, &name);
            let entry_path = entry.path();
            // Follow symlinks, so a link to a directory is walked like one.
            let metadata = match fs::metadata(&entry_path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping unreadable entry {}: {}", entry_path.display(), e);
                    continue;
                }
            };
            if metadata.is_dir() {
                if Self::links_to_ancestor(dir, &entry_path) {
                    debug!("Skipping looping symlink {}", entry_path.display());
                    continue;
                }
                if Self::walk(&entry_path, &path, callback)? == EnumerateStatus::Canceled {
                    return Ok(EnumerateStatus::Canceled);
                }
            } else if !callback(&path) {
                return Ok(EnumerateStatus::Canceled);
            }
        }
        Ok(EnumerateStatus::Completed)
    }

    fn links_to_ancestor(dir: &Path, entry_path: &Path) -> bool {
        let is_link = fs::symlink_metadata(entry_path)
            .map(|metadata| metadata.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link {
            return false;
        }
        match (fs::canonicalize(dir), fs::canonicalize(entry_path)) {
            (Ok(dir), Ok(target)) => dir.starts_with(target),
            _ => true,
        }
    }
}

impl FileManager for DirFileManager {
    fn is_valid(&self) -> bool {
        self.base_path.is_some()
    }

    fn init(&mut self, base_path: &Path, create: bool) -> FileResult<()> {
        if base_path.as_os_str().is_empty() {
            return Err(FileError::invalid_path(""));
        }

        let path = absolute_path(base_path).map_err(|e| FileError::from_io(e, base_path))?;
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                debug!("Not a directory: {}", path.display());
                return Err(FileError::invalid_path(path.display().to_string()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && create => {
                fs::create_dir_all(&path).map_err(|e| {
                    warn!("Can't create directory {}: {}", path.display(), e);
                    FileError::from_io(e, &path)
                })?;
            }
            Err(e) => return Err(FileError::from_io(e, &path)),
        }

        self.scratch.clear();
        info!("Directory file manager initialized for {}", path.display());
        self.base_path = Some(path);
        Ok(())
    }

    fn read_file(&mut self, file: &str) -> FileResult<Vec<u8>> {
        let path = self.resolve(file)?;
        let metadata = fs::metadata(&path).map_err(|e| FileError::from_io(e, &path))?;
        if !metadata.is_file() {
            return Err(FileError::not_found(path.display().to_string()));
        }
        if metadata.len() > MAX_FILE_SIZE {
            warn!("{} is too large to read into memory", path.display());
            return Err(FileError::TooLarge {
                path: path.display().to_string(),
                limit: MAX_FILE_SIZE,
            });
        }

        fs::read(&path).map_err(|e| FileError::from_io(e, &path))
    }

    fn write_file(&mut self, file: &str, data: &[u8], overwrite: bool) -> FileResult<()> {
        let path = self.resolve(file)?;

        if let Ok(metadata) = fs::symlink_metadata(&path) {
            if !overwrite {
                debug!("Can't overwrite existing file {}", path.display());
                return Err(FileError::AlreadyExists {
                    path: path.display().to_string(),
                });
            }
            if metadata.is_dir() {
                warn!("Can't overwrite directory {} with a file", path.display());
                return Err(FileError::AlreadyExists {
                    path: path.display().to_string(),
                });
            }
            fs::remove_file(&path).map_err(|e| FileError::from_io(e, &path))?;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FileError::from_io(e, parent))?;
        }
        fs::write(&path, data).map_err(|e| {
            warn!("Failed to write {}: {}", path.display(), e);
            FileError::from_io(e, &path)
        })
    }

    fn remove_file(&mut self, file: &str) -> FileResult<()> {
        let path = self.resolve(file)?;
        let metadata = fs::symlink_metadata(&path).map_err(|e| FileError::from_io(e, &path))?;

        let result = if metadata.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| {
            warn!("Failed to remove {}: {}", path.display(), e);
            FileError::from_io(e, &path)
        })
    }

    fn extract_file(&mut self, file: &str, into_file: Option<&Path>) -> FileResult<PathBuf> {
        let source = self.resolve(file)?;
        if !source.is_file() {
            return Err(FileError::not_found(source.display().to_string()));
        }

        let target = match into_file {
            Some(target) => target.to_path_buf(),
            None => {
                let base = self.base_path.as_deref().ok_or(FileError::NotInitialized)?;
                let relative = normalize_file_path(file);
                self.scratch.ensure(base)?.join(relative)
            }
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FileError::from_io(e, parent))?;
        }

        fs::copy(&source, &target).map_err(|e| {
            warn!(
                "Failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                e
            );
            FileError::from_io(e, &target)
        })?;
        Ok(target)
    }

    fn file_exists(&mut self, file: &str) -> bool {
        self.resolve(file).map(|path| path.exists()).unwrap_or(false)
    }

    fn is_directly_accessible(&self, file: &str) -> bool {
        self.resolve(file).is_ok()
    }

    fn full_path(&self, file: &str) -> Option<PathBuf> {
        if file.is_empty() {
            return self.base_path.clone();
        }
        self.resolve(file).ok()
    }

    fn last_modified_time(&mut self, file: &str) -> FileResult<SystemTime> {
        let path = self.resolve(file)?;
        fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| FileError::from_io(e, &path))
    }

    fn enumerate_files(
        &mut self,
        dir: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus> {
        let root = if normalize_file_path(dir).is_empty() {
            self.base_path.clone().ok_or(FileError::NotInitialized)?
        } else {
            self.resolve(dir)?
        };

        if !root.is_dir() {
            debug!("Nothing to enumerate under {}", root.display());
            return Ok(EnumerateStatus::Completed);
        }
        Self::walk(&root, "", callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn manager() -> (TempDir, DirFileManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = DirFileManager::create(temp_dir.path(), false).unwrap();
        (temp_dir, manager)
    }

    #[test]
    fn test_init_rules() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("profile");

        let mut fm = DirFileManager::new();
        assert!(!fm.is_valid());
        assert_matches!(fm.init(&missing, false), Err(FileError::NotFound { .. }));
        assert!(!fm.is_valid());

        fm.init(&missing, true).unwrap();
        assert!(fm.is_valid());
        assert!(missing.is_dir());
        assert_eq!(fm.full_path(""), Some(missing.clone()));

        let file = temp_dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        assert_matches!(
            DirFileManager::create(&file, true),
            Err(FileError::InvalidPath { .. })
        );
    }

    #[test]
    fn test_uninitialized_operations_fail() {
        let mut fm = DirFileManager::new();
        assert_matches!(fm.read_file("main.xml"), Err(FileError::NotInitialized));
        assert!(!fm.file_exists("main.xml"));
        assert_matches!(
            fm.enumerate_files("", &mut |_| true),
            Err(FileError::NotInitialized)
        );
    }

    #[test]
    fn test_write_read_overwrite() {
        let (temp_dir, mut fm) = manager();

        fm.write_file("zh_CN/strings.xml", b"<strings/>", false).unwrap();
        assert!(temp_dir.path().join("zh_CN/strings.xml").is_file());
        assert_eq!(fm.read_file("zh_CN/strings.xml").unwrap(), b"<strings/>");

        assert_matches!(
            fm.write_file("zh_CN/strings.xml", b"new", false),
            Err(FileError::AlreadyExists { .. })
        );
        fm.write_file("zh_CN/strings.xml", b"new", true).unwrap();
        assert_eq!(fm.read_file("zh_CN/strings.xml").unwrap(), b"new");

        assert_matches!(
            fm.write_file("zh_CN", b"dir", true),
            Err(FileError::AlreadyExists { .. })
        );
    }

    #[test]
    fn test_paths_cannot_escape_base() {
        let (temp_dir, mut fm) = manager();
        std::fs::write(temp_dir.path().join("inside.txt"), b"ok").unwrap();

        assert_matches!(fm.read_file("../inside.txt"), Err(FileError::InvalidPath { .. }));
        assert_matches!(fm.read_file("/etc/hosts"), Err(FileError::InvalidPath { .. }));
        assert_matches!(fm.read_file(""), Err(FileError::InvalidPath { .. }));
        assert_eq!(fm.read_file("sub/../inside.txt").unwrap(), b"ok");
        assert!(!fm.is_directly_accessible("../x"));
        assert!(fm.is_directly_accessible("inside.txt"));
        assert_eq!(fm.full_path("../x"), None);
    }

    #[test]
    fn test_remove_file_and_directory() {
        let (temp_dir, mut fm) = manager();
        fm.write_file("a.txt", b"a", false).unwrap();
        fm.write_file("en/strings.xml", b"s", false).unwrap();

        fm.remove_file("a.txt").unwrap();
        assert!(!fm.file_exists("a.txt"));

        fm.remove_file("en").unwrap();
        assert!(!temp_dir.path().join("en").exists());

        assert_matches!(fm.remove_file("a.txt"), Err(FileError::NotFound { .. }));
    }

    #[test]
    fn test_enumerate_sorted_and_skips_hidden() {
        let (_temp_dir, mut fm) = manager();
        fm.write_file("main.xml", b"", false).unwrap();
        fm.write_file(".hidden", b"", false).unwrap();
        fm.write_file("zh_CN/strings.xml", b"", false).unwrap();
        fm.write_file("zh_CN/big_file", b"", false).unwrap();
        fm.write_file(".git/config", b"", false).unwrap();

        assert_eq!(
            fm.list_files("").unwrap(),
            vec!["main.xml", "zh_CN/big_file", "zh_CN/strings.xml"]
        );
        assert_eq!(
            fm.list_files("zh_CN").unwrap(),
            vec!["big_file", "strings.xml"]
        );
        assert!(fm.list_files("missing").unwrap().is_empty());

        let mut first = Vec::new();
        let status = fm
            .enumerate_files("", &mut |name| {
                first.push(name.to_string());
                false
            })
            .unwrap();
        assert_eq!(status, EnumerateStatus::Canceled);
        assert_eq!(first, vec!["main.xml"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_follows_directory_symlinks() {
        let (temp_dir, mut fm) = manager();
        let shared = TempDir::new().unwrap();
        std::fs::create_dir(shared.path().join("en")).unwrap();
        std::fs::write(shared.path().join("en/strings.xml"), b"").unwrap();

        fm.write_file("main.xml", b"", false).unwrap();
        std::os::unix::fs::symlink(shared.path(), temp_dir.path().join("shared")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("zloop")).unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("gone"),
            temp_dir.path().join("dangling"),
        )
        .unwrap();

        assert_eq!(
            fm.list_files("").unwrap(),
            vec!["main.xml", "shared/en/strings.xml"]
        );
    }

    #[test]
    fn test_extract_into_scratch() {
        let (_temp_dir, mut fm) = manager();
        fm.write_file("1033/strings.xml", b"hello", false).unwrap();

        let extracted = fm.extract_file("1033/strings.xml", None).unwrap();
        assert!(extracted.ends_with("1033/strings.xml"));
        assert_eq!(std::fs::read(&extracted).unwrap(), b"hello");

        assert_matches!(
            fm.extract_file("missing.xml", None),
            Err(FileError::NotFound { .. })
        );

        drop(fm);
        assert!(!extracted.exists());
    }

    #[test]
    fn test_extract_into_target() {
        let (temp_dir, mut fm) = manager();
        fm.write_file("main.xml", b"<view/>", false).unwrap();

        let target = temp_dir.path().join("out/copy.xml");
        let extracted = fm.extract_file("main.xml", Some(&target)).unwrap();
        assert_eq!(extracted, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"<view/>");
    }

    #[test]
    fn test_last_modified_time() {
        let (_temp_dir, mut fm) = manager();
        fm.write_file("main.xml", b"", false).unwrap();

        let modified = fm.last_modified_time("main.xml").unwrap();
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        assert!(age.as_secs() < 60);
        assert!(fm.last_modified_time("missing").is_err());
    }
}
