//! Core modules for resfs
//!
//! This module contains the pieces every file manager builds on:
//! - The `FileManager` trait and enumeration status
//! - Error handling
//! - Path normalization and prefix matching
//! - Scratch directories for extracted files
//! - An in-memory file manager

pub mod errors;
pub mod file_manager;
pub mod memory;
pub mod path;
pub mod scratch;

// Re-export commonly used items
pub use errors::{FileError, FileResult};
pub use file_manager::{EnumerateStatus, FileManager};
pub use memory::MemoryFileManager;
pub use scratch::ScratchDir;
