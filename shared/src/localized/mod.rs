//! Localized file manager
//!
//! Wraps another file manager and retries lookups under locale
//! directories. For `strings.xml` in locale `zh-CN` the order is
//! `strings.xml`, `zh-CN/strings.xml`, `zh-cn/strings.xml`,
//! `zh_CN/strings.xml`, `zh_cn/strings.xml`, `2052/strings.xml`,
//! `en/strings.xml`, `1033/strings.xml`.

pub mod locales;

pub use locales::{system_locale_name, windows_locale_id, LocaleInfo, DEFAULT_LOCALE};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::core::errors::{keep_most_specific, FileError, FileResult};
use crate::core::file_manager::{EnumerateStatus, FileManager};
use crate::core::path::build_file_path;

/// Windows identifier of `en-US`, the last resort for Windows packages
const ENGLISH_WINDOWS_ID: &str = "1033";

/// Build the ordered, duplicate-free list of locale directory candidates.
pub fn locale_prefixes(locale: &str) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !prefixes.contains(&candidate) {
            prefixes.push(candidate);
        }
    };

    push(locale.to_string());
    push(locale.to_lowercase());
    if locale.contains('-') {
        let underscored = locale.replacen('-', "_", 1);
        let lowered = underscored.to_lowercase();
        push(underscored);
        push(lowered);
    }
    if let Some(id) = windows_locale_id(locale) {
        push(id);
    }
    if locale != DEFAULT_LOCALE {
        push(DEFAULT_LOCALE.to_string());
        push(ENGLISH_WINDOWS_ID.to_string());
    }

    prefixes
}

/// File manager that falls back to locale-specific copies of a file
pub struct LocalizedFileManager {
    file_manager: Option<Box<dyn FileManager>>,
    locale: String,
    prefixes: Vec<String>,
}

impl LocalizedFileManager {
    /// Wrap `file_manager` using the system locale
    pub fn new(file_manager: Box<dyn FileManager>) -> Self {
        Self::with_locale(file_manager, "")
    }

    /// Wrap `file_manager` using `locale`; an empty locale means the
    /// system locale
    pub fn with_locale(file_manager: Box<dyn FileManager>, locale: &str) -> Self {
        let mut manager = Self::empty(locale);
        manager.file_manager = Some(file_manager);
        manager
    }

    /// A localized manager with nothing attached yet
    pub fn empty(locale: &str) -> Self {
        let locale = if locale.is_empty() {
            system_locale_name()
        } else {
            locale.to_string()
        };
        let prefixes = locale_prefixes(&locale);
        debug!("Locale {} resolves to prefixes {:?}", locale, prefixes);

        Self {
            file_manager: None,
            locale,
            prefixes,
        }
    }

    /// Replace the wrapped manager, returning the previous one
    pub fn attach(&mut self, file_manager: Box<dyn FileManager>) -> Option<Box<dyn FileManager>> {
        self.file_manager.replace(file_manager)
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn locale_prefixes(&self) -> &[String] {
        &self.prefixes
    }

    fn inner(&self) -> FileResult<&dyn FileManager> {
        self.file_manager.as_deref().ok_or(FileError::NotInitialized)
    }

    fn inner_mut(&mut self) -> FileResult<&mut dyn FileManager> {
        match self.file_manager.as_deref_mut() {
            Some(file_manager) => Ok(file_manager),
            None => Err(FileError::NotInitialized),
        }
    }

    /// Run `op` on the unlocalized path, then on each locale-prefixed
    /// path, until one succeeds.
    fn first_localized<T>(
        &mut self,
        file: &str,
        mut op: impl FnMut(&mut dyn FileManager, &str) -> FileResult<T>,
    ) -> FileResult<T> {
        if file.is_empty() {
            return Err(FileError::invalid_path(file));
        }
        let file_manager = match self.file_manager.as_deref_mut() {
            Some(file_manager) => file_manager,
            None => return Err(FileError::NotInitialized),
        };

        let mut error: Option<FileError> = None;
        let candidates = std::iter::once(file.to_string())
            .chain(self.prefixes.iter().map(|prefix| build_file_path(prefix, file)));
        for path in candidates {
            match op(&mut *file_manager, &path) {
                Ok(value) => {
                    if path != file {
                        debug!("Resolved {} as {}", file, path);
                    }
                    return Ok(value);
                }
                Err(e) => keep_most_specific(&mut error, e),
            }
        }
        Err(error.unwrap_or_else(|| FileError::not_found(file)))
    }
}

impl fmt::Debug for LocalizedFileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalizedFileManager")
            .field("locale", &self.locale)
            .field("prefixes", &self.prefixes)
            .field("attached", &self.file_manager.is_some())
            .finish()
    }
}

impl FileManager for LocalizedFileManager {
    fn is_valid(&self) -> bool {
        self.inner().map(|fm| fm.is_valid()).unwrap_or(false)
    }

    fn init(&mut self, base_path: &Path, create: bool) -> FileResult<()> {
        self.inner_mut()?.init(base_path, create)
    }

    fn read_file(&mut self, file: &str) -> FileResult<Vec<u8>> {
        self.first_localized(file, |fm, path| fm.read_file(path))
    }

    fn write_file(&mut self, file: &str, data: &[u8], overwrite: bool) -> FileResult<()> {
        self.inner_mut()?.write_file(file, data, overwrite)
    }

    /// Removes the unlocalized file and every localized copy.
    fn remove_file(&mut self, file: &str) -> FileResult<()> {
        if file.is_empty() {
            return Err(FileError::invalid_path(file));
        }
        let file_manager = match self.file_manager.as_deref_mut() {
            Some(file_manager) => file_manager,
            None => return Err(FileError::NotInitialized),
        };

        let mut removed = false;
        let mut error: Option<FileError> = None;
        let candidates = std::iter::once(file.to_string())
            .chain(self.prefixes.iter().map(|prefix| build_file_path(prefix, file)));
        for path in candidates {
            match file_manager.remove_file(&path) {
                Ok(()) => {
                    debug!("Removed {}", path);
                    removed = true;
                }
                Err(e) => keep_most_specific(&mut error, e),
            }
        }

        if removed {
            Ok(())
        } else {
            Err(error.unwrap_or_else(|| FileError::not_found(file)))
        }
    }

    fn extract_file(&mut self, file: &str, into_file: Option<&Path>) -> FileResult<PathBuf> {
        self.first_localized(file, |fm, path| fm.extract_file(path, into_file))
    }

    fn file_exists(&mut self, file: &str) -> bool {
        self.first_localized(file, |fm, path| {
            if fm.file_exists(path) {
                Ok(())
            } else {
                Err(FileError::not_found(path))
            }
        })
        .is_ok()
    }

    fn is_directly_accessible(&self, file: &str) -> bool {
        self.inner()
            .map(|fm| fm.is_directly_accessible(file))
            .unwrap_or(false)
    }

    fn full_path(&self, file: &str) -> Option<PathBuf> {
        self.inner().ok()?.full_path(file)
    }

    fn last_modified_time(&mut self, file: &str) -> FileResult<SystemTime> {
        self.inner_mut()?.last_modified_time(file)
    }

    fn enumerate_files(
        &mut self,
        dir: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus> {
        self.inner_mut()?.enumerate_files(dir, callback)
    }
}
