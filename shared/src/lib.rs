//! resfs Shared Library
//!
//! Layered virtual file managers for gadget packages and application
//! resources. Every backend implements the [`FileManager`] trait, so a
//! caller can read, write, extract and enumerate files without knowing
//! whether they live in a directory, a zip archive, a locale subdirectory
//! or behind a prefix of the global wrapper.
//!
//! # Features
//!
//! - **Directory backend**: Files under a base directory on disk
//! - **Zip backend**: Read and modify `.gg`/`.zip` packages in place
//! - **Localized lookup**: Fall back to `zh_CN/`, `2052/`, `en/` and friends
//! - **Prefix routing**: Mount managers under `resource://`, `profile://`, ...
//! - **Configuration**: TOML description of the global mounts
//!
//! # Usage
//!
//! ```rust
//! use resfs_shared::{FileManager, FileManagerWrapper, MemoryFileManager};
//!
//! let mut package = MemoryFileManager::new();
//! package.add_file("main.xml", "<view/>");
//!
//! let mut wrapper = FileManagerWrapper::new();
//! wrapper
//!     .register_file_manager("pkg/", Box::new(package))
//!     .unwrap();
//!
//! assert_eq!(wrapper.read_file("pkg/main.xml").unwrap(), b"<view/>");
//! ```

pub mod archive;
pub mod config;
pub mod core;
pub mod directory;
pub mod factory;
pub mod localized;
pub mod logging;
pub mod wrapper;

// Re-export commonly used types for convenience
pub use crate::core::{
    EnumerateStatus, FileError, FileManager, FileResult, MemoryFileManager, ScratchDir,
};

pub use archive::ZipFileManager;
pub use config::{ConfigError, MountConfig, ResfsConfig};
pub use directory::DirFileManager;
pub use factory::{create_file_manager, create_gadget_file_manager, setup_global_file_manager};
pub use localized::LocalizedFileManager;
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use wrapper::FileManagerWrapper;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest file read into memory at once (20 MiB)
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Prefix of the global resource package
pub const RESOURCE_PREFIX: &str = "resource://";

/// Prefix of the writable profile directory
pub const PROFILE_PREFIX: &str = "profile://";

/// Prefix (and base directory) of the exposed filesystem root
pub const ROOT_PREFIX: &str = "/";

/// Extension of packed gadget packages
pub const GADGET_FILE_SUFFIX: &str = ".gg";

/// Manifest file at the top of every gadget package
pub const MANIFEST_FILE: &str = "gadget.gmanifest";
