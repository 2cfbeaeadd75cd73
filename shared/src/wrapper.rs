//! Prefix-routing file manager
//!
//! A [`FileManagerWrapper`] owns a list of `(prefix, manager)` pairs and at
//! most one default manager. A path is offered to every registered manager
//! whose prefix it starts with, in registration order, with the prefix
//! stripped. The default manager only sees paths that matched no prefix.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::core::errors::{keep_most_specific, FileError, FileResult};
use crate::core::file_manager::{EnumerateStatus, FileManager};
use crate::core::path::{strip_path_prefix, DIR_SEPARATOR};

/// Prepend the unmatched part of a mount prefix to a name reported by the
/// mounted manager. Prefixes such as `resource://` keep all their slashes.
fn join_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(DIR_SEPARATOR) {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}{DIR_SEPARATOR}{name}")
    }
}

/// Routes file operations to managers registered under path prefixes
#[derive(Default)]
pub struct FileManagerWrapper {
    file_managers: Vec<(String, Box<dyn FileManager>)>,
    default: Option<Box<dyn FileManager>>,
}

impl FileManagerWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file_manager` under `prefix`.
    ///
    /// An empty prefix installs the default manager, which must not be set
    /// already. A prefixed manager must be valid. The same prefix may be
    /// registered more than once; lookups try them in registration order.
    pub fn register_file_manager(
        &mut self,
        prefix: &str,
        file_manager: Box<dyn FileManager>,
    ) -> FileResult<()> {
        if prefix.is_empty() {
            if self.default.is_some() {
                warn!("Default file manager must be unregistered before it is replaced");
                return Err(FileError::Registration {
                    reason: "a default file manager is already registered".to_string(),
                });
            }
            debug!("Registered default file manager");
            self.default = Some(file_manager);
            return Ok(());
        }

        if !file_manager.is_valid() {
            warn!("Invalid file manager specified for prefix {}", prefix);
            return Err(FileError::Registration {
                reason: format!("file manager for prefix {} is not initialized", prefix),
            });
        }

        debug!("Registered file manager for prefix {}", prefix);
        self.file_managers.push((prefix.to_string(), file_manager));
        Ok(())
    }

    /// Remove and return the default manager (empty prefix) or the first
    /// manager registered with exactly `prefix`.
    pub fn unregister_file_manager(&mut self, prefix: &str) -> Option<Box<dyn FileManager>> {
        if prefix.is_empty() {
            return self.default.take();
        }

        let position = self
            .file_managers
            .iter()
            .position(|(registered, _)| registered == prefix);
        match position {
            Some(index) => Some(self.file_managers.remove(index).1),
            None => {
                debug!("No file manager registered for prefix {}", prefix);
                None
            }
        }
    }

    /// Registered prefixes in lookup order
    pub fn registered_prefixes(&self) -> Vec<&str> {
        self.file_managers
            .iter()
            .map(|(prefix, _)| prefix.as_str())
            .collect()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Find the next registered manager at or after `*index` whose prefix
    /// matches `path`; returns its position and the path with the prefix
    /// stripped.
    fn next_matching(&self, path: &str, index: &mut usize) -> Option<(usize, String)> {
        if path.is_empty() {
            return None;
        }
        while *index < self.file_managers.len() {
            let current = *index;
            *index += 1;
            let prefix = &self.file_managers[current].0;
            if let Some(rest) = strip_path_prefix(path, prefix) {
                return Some((current, rest.to_string()));
            }
        }
        None
    }

    /// Offer `file` to each matching manager until one succeeds; fall back
    /// to the default manager only when no prefix matched.
    fn dispatch<T>(
        &mut self,
        file: &str,
        mut op: impl FnMut(&mut dyn FileManager, &str) -> FileResult<T>,
    ) -> FileResult<T> {
        if file.is_empty() {
            return Err(FileError::invalid_path(file));
        }

        let mut index = 0;
        let mut matched = false;
        let mut error = None;
        while let Some((position, lookup)) = self.next_matching(file, &mut index) {
            matched = true;
            match op(self.file_managers[position].1.as_mut(), &lookup) {
                Ok(value) => return Ok(value),
                Err(e) => keep_most_specific(&mut error, e),
            }
        }

        if matched {
            return Err(error.unwrap_or_else(|| FileError::not_found(file)));
        }
        match self.default.as_deref_mut() {
            Some(default) => op(default, file),
            None => Err(FileError::not_found(file)),
        }
    }
}

impl fmt::Debug for FileManagerWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileManagerWrapper")
            .field("prefixes", &self.registered_prefixes())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

impl FileManager for FileManagerWrapper {
    fn is_valid(&self) -> bool {
        self.default.as_ref().map_or(false, |fm| fm.is_valid())
            || self.file_managers.iter().any(|(_, fm)| fm.is_valid())
    }

    fn init(&mut self, base_path: &Path, create: bool) -> FileResult<()> {
        match self.default.as_deref_mut() {
            Some(default) => default.init(base_path, create),
            None => Err(FileError::NotInitialized),
        }
    }

    fn read_file(&mut self, file: &str) -> FileResult<Vec<u8>> {
        self.dispatch(file, |fm, path| fm.read_file(path))
    }

    fn write_file(&mut self, file: &str, data: &[u8], overwrite: bool) -> FileResult<()> {
        self.dispatch(file, |fm, path| fm.write_file(path, data, overwrite))
    }

    /// Removes the file from every matching manager.
    fn remove_file(&mut self, file: &str) -> FileResult<()> {
        if file.is_empty() {
            return Err(FileError::invalid_path(file));
        }

        let mut index = 0;
        let mut matched = false;
        let mut removed = false;
        let mut error = None;
        while let Some((position, lookup)) = self.next_matching(file, &mut index) {
            matched = true;
            match self.file_managers[position].1.remove_file(&lookup) {
                Ok(()) => removed = true,
                Err(e) => keep_most_specific(&mut error, e),
            }
        }

        if !matched {
            return match self.default.as_deref_mut() {
                Some(default) => default.remove_file(file),
                None => Err(FileError::not_found(file)),
            };
        }
        if removed {
            Ok(())
        } else {
            Err(error.unwrap_or_else(|| FileError::not_found(file)))
        }
    }

    fn extract_file(&mut self, file: &str, into_file: Option<&Path>) -> FileResult<PathBuf> {
        self.dispatch(file, |fm, path| fm.extract_file(path, into_file))
    }

    fn file_exists(&mut self, file: &str) -> bool {
        self.dispatch(file, |fm, path| {
            if fm.file_exists(path) {
                Ok(())
            } else {
                Err(FileError::not_found(path))
            }
        })
        .is_ok()
    }

    fn is_directly_accessible(&self, file: &str) -> bool {
        let mut index = 0;
        let mut matched = false;
        while let Some((position, lookup)) = self.next_matching(file, &mut index) {
            matched = true;
            if self.file_managers[position].1.is_directly_accessible(&lookup) {
                return true;
            }
        }
        !matched
            && self
                .default
                .as_ref()
                .map_or(false, |fm| fm.is_directly_accessible(file))
    }

    fn full_path(&self, file: &str) -> Option<PathBuf> {
        let mut index = 0;
        let mut matched = false;
        while let Some((position, lookup)) = self.next_matching(file, &mut index) {
            matched = true;
            if let Some(path) = self.file_managers[position].1.full_path(&lookup) {
                return Some(path);
            }
        }
        if matched {
            return None;
        }
        self.default.as_ref()?.full_path(file)
    }

    fn last_modified_time(&mut self, file: &str) -> FileResult<SystemTime> {
        self.dispatch(file, |fm, path| fm.last_modified_time(path))
    }

    /// Enumerates every manager whose prefix lies at or above `dir`, every
    /// manager mounted below `dir`, then the default manager. A path is
    /// reported once even when several managers provide it.
    fn enumerate_files(
        &mut self,
        dir: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus> {
        let dir_with_sep = if dir.is_empty() || dir.ends_with(DIR_SEPARATOR) {
            dir.to_string()
        } else {
            format!("{dir}{DIR_SEPARATOR}")
        };

        let mut history: HashSet<String> = HashSet::new();
        let mut report = |history: &mut HashSet<String>, name: String| -> bool {
            if history.insert(name.clone()) {
                callback(&name)
            } else {
                true
            }
        };

        for (prefix, fm) in self.file_managers.iter_mut() {
            let status = if let Some(rest) = strip_path_prefix(&dir_with_sep, prefix) {
                // dir lies inside this manager
                fm.enumerate_files(rest, &mut |name: &str| {
                    report(&mut history, name.to_string())
                })?
            } else if let Some(sub_dir) = strip_path_prefix(prefix, &dir_with_sep) {
                // this manager is mounted below dir
                fm.enumerate_files("", &mut |name: &str| {
                    report(&mut history, join_prefix(sub_dir, name))
                })?
            } else {
                continue;
            };
            if status == EnumerateStatus::Canceled {
                return Ok(EnumerateStatus::Canceled);
            }
        }

        match self.default.as_deref_mut() {
            Some(default) => default.enumerate_files(dir, &mut |name: &str| {
                report(&mut history, name.to_string())
            }),
            None => Ok(EnumerateStatus::Completed),
        }
    }
}
