//! File manager construction
//!
//! Picks a backend for a path on disk and assembles the process-wide
//! wrapper from a [`ResfsConfig`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::archive::ZipFileManager;
use crate::config::ResfsConfig;
use crate::core::errors::{FileError, FileResult};
use crate::core::file_manager::FileManager;
use crate::directory::DirFileManager;
use crate::localized::LocalizedFileManager;
use crate::wrapper::FileManagerWrapper;
use crate::{GADGET_FILE_SUFFIX, PROFILE_PREFIX, RESOURCE_PREFIX, ROOT_PREFIX};

/// Suffixes that select the zip backend for a path that does not exist yet
const ARCHIVE_SUFFIXES: [&str; 2] = [GADGET_FILE_SUFFIX, ".zip"];

fn is_archive_name(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix| suffix.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Create a file manager for `path`.
///
/// # Arguments
/// * `path` - Directory or archive to serve
/// * `create` - Create the backing directory or archive when missing
///
/// # Returns
/// A directory manager for directories, a zip manager for regular files.
/// A missing path is created as an archive when its extension is `.gg` or
/// `.zip` and as a directory otherwise.
pub fn create_file_manager(path: &Path, create: bool) -> FileResult<Box<dyn FileManager>> {
    if path.is_dir() {
        debug!("Serving directory {:?}", path);
        return Ok(Box::new(DirFileManager::create(path, false)?));
    }
    if path.is_file() {
        debug!("Serving archive {:?}", path);
        return Ok(Box::new(ZipFileManager::create(path, false)?));
    }
    if !create {
        return Err(FileError::not_found(path.display().to_string()));
    }

    if is_archive_name(path) {
        info!("Creating archive {:?}", path);
        Ok(Box::new(ZipFileManager::create(path, true)?))
    } else {
        info!("Creating directory {:?}", path);
        Ok(Box::new(DirFileManager::create(path, true)?))
    }
}

/// Create the localized file manager of a gadget package.
///
/// `base_path` may name the package itself or the manifest file inside an
/// unpacked package, in which case its parent directory is served.
pub fn create_gadget_file_manager(
    manifest_filename: &str,
    base_path: &Path,
    locale: &str,
) -> FileResult<LocalizedFileManager> {
    let package_path = match (base_path.file_name(), base_path.parent()) {
        (Some(name), Some(parent)) if name == manifest_filename => {
            if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            }
        }
        _ => base_path,
    };

    let file_manager = create_file_manager(package_path, false)?;
    Ok(LocalizedFileManager::with_locale(file_manager, locale))
}

/// Build the global file manager described by `config`.
///
/// Registers, in order: the first usable resource path under
/// `resource://` (localized), the filesystem root under `/` when exposed,
/// the profile directory under `profile://` and every configured mount.
/// A mount with an empty prefix becomes the default manager.
pub fn setup_global_file_manager(config: &ResfsConfig) -> FileResult<FileManagerWrapper> {
    let locale = config.locale.as_deref().unwrap_or("");
    let mut wrapper = FileManagerWrapper::new();

    for resource_path in &config.resource_paths {
        let resource_path = ResfsConfig::expand_path(resource_path);
        match create_file_manager(&resource_path, false) {
            Ok(file_manager) => {
                info!("Using resources from {:?}", resource_path);
                wrapper.register_file_manager(
                    RESOURCE_PREFIX,
                    Box::new(LocalizedFileManager::with_locale(file_manager, locale)),
                )?;
                break;
            }
            Err(e) => debug!("Skipping resource path {:?}: {}", resource_path, e),
        }
    }

    if config.expose_root {
        match DirFileManager::create(Path::new(ROOT_PREFIX), false) {
            Ok(file_manager) => {
                wrapper.register_file_manager(ROOT_PREFIX, Box::new(file_manager))?
            }
            Err(e) => warn!("Failed to expose the filesystem root: {}", e),
        }
    }

    match config.profile_directory() {
        Some(profile_dir) => match DirFileManager::create(&profile_dir, true) {
            Ok(file_manager) => {
                wrapper.register_file_manager(PROFILE_PREFIX, Box::new(file_manager))?
            }
            Err(e) => warn!(
                "Failed to initialize profile directory {:?}: {}",
                profile_dir, e
            ),
        },
        None => warn!("No profile directory available"),
    }

    for mount in &config.mounts {
        let mount_path = ResfsConfig::expand_path(&mount.path);
        let file_manager = create_file_manager(&mount_path, mount.create)?;
        let file_manager: Box<dyn FileManager> = if mount.localized {
            Box::new(LocalizedFileManager::with_locale(file_manager, locale))
        } else {
            file_manager
        };
        debug!("Mounting {:?} at {:?}", mount_path, mount.prefix);
        wrapper.register_file_manager(&mount.prefix, file_manager)?;
    }

    Ok(wrapper)
}
