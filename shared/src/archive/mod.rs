//! Zip archive file manager for resfs
//!
//! Gadget packages are usually shipped as zip files. This module serves
//! their contents through the `FileManager` interface: reading entries into
//! memory or onto disk, appending new entries and deleting entries by
//! rewriting the archive.

pub mod manager;

pub use manager::ZipFileManager;

/// Hidden entry seeded into every archive this crate creates, so an
/// otherwise empty archive still holds at least one entry
pub const ZIP_README_FILE: &str = ".readme";

/// Archive comment and `.readme` contents of newly created archives
pub const ZIP_GLOBAL_COMMENT: &str = "Created by resfs.";

/// Name prefix of the scratch archive written while deleting an entry
pub const TEMP_ZIP_PREFIX: &str = "%%Temp%%";

use crate::core::errors::FileError;
use zip::result::ZipError;

/// Map a zip library error to a file manager error.
///
/// I/O failures stay I/O failures; everything else means the archive
/// content itself is unusable.
pub(crate) fn archive_error(err: ZipError) -> FileError {
    match err {
        ZipError::Io(e) => FileError::Io(e),
        ZipError::FileNotFound => FileError::not_found("zip entry"),
        other => FileError::CorruptedArchive {
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_archive_error_mapping() {
        assert_matches!(
            archive_error(ZipError::InvalidArchive("bad header")),
            FileError::CorruptedArchive { ref reason } if reason.contains("bad header")
        );
        assert_matches!(
            archive_error(ZipError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk"
            ))),
            FileError::Io(_)
        );
        assert!(archive_error(ZipError::FileNotFound).is_not_found());
    }
}
