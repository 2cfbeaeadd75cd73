//! Zip-backed file manager
//!
//! At most one of a read handle or a write handle is open at any time.
//! Reads go through a `ZipArchive` that is reopened whenever the archive
//! changed on disk; writes append through a `ZipWriter`, which is finalized
//! before the next read. Entries are deleted by copying every other entry
//! into a temporary archive next to the original and renaming it over the
//! original, so a failed deletion never touches the original file.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Datelike, Local, NaiveDate, TimeZone, Timelike};
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{archive_error, TEMP_ZIP_PREFIX, ZIP_GLOBAL_COMMENT, ZIP_README_FILE};
use crate::core::errors::{FileError, FileResult};
use crate::core::file_manager::{EnumerateStatus, FileManager};
use crate::core::path::{
    absolute_path, names_equal, normalize_file_path, relative_file_path, strip_path_prefix,
};
use crate::core::scratch::ScratchDir;
use crate::MAX_FILE_SIZE;

const EXTRACT_CHUNK_SIZE: usize = 64 * 1024;

/// Entries at or beyond this size need zip64 records
const ZIP64_LIMIT: u64 = u32::MAX as u64;
const ZIP64_EXTRA_FIELD: u16 = 0x0001;

const CENTRAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x01\x02";
const CENTRAL_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
const END_OF_CENTRAL_LEN: usize = 22;

/// Size and modification time of the archive when a read handle was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArchiveStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl ArchiveStamp {
    fn of(path: &Path) -> FileResult<Self> {
        let metadata = fs::metadata(path).map_err(|e| FileError::from_io(e, path))?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

enum ArchiveHandle {
    Closed,
    Read {
        archive: ZipArchive<File>,
        stamp: ArchiveStamp,
    },
    Write(ZipWriter<File>),
}

/// File manager serving the entries of a zip archive
pub struct ZipFileManager {
    base_path: Option<PathBuf>,
    handle: ArchiveHandle,
    scratch: ScratchDir,
}

impl ZipFileManager {
    /// Create an uninitialized manager
    pub fn new() -> Self {
        Self {
            base_path: None,
            handle: ArchiveHandle::Closed,
            scratch: ScratchDir::new(),
        }
    }

    /// Create and initialize a manager in one step
    pub fn create(base_path: &Path, create: bool) -> FileResult<Self> {
        let mut manager = Self::new();
        manager.init(base_path, create)?;
        Ok(manager)
    }

    /// The absolute archive path, once initialized
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    fn base(&self) -> FileResult<PathBuf> {
        self.base_path.clone().ok_or(FileError::NotInitialized)
    }

    fn check_path(&self, file: &str) -> FileResult<String> {
        if self.base_path.is_none() {
            debug!("Zip file manager used before init");
            return Err(FileError::NotInitialized);
        }
        relative_file_path(file).ok_or_else(|| {
            debug!("Invalid file path for {:?}: {:?}", self.base_path, file);
            FileError::invalid_path(file)
        })
    }

    /// Finalize an open writer and drop any open handle
    fn close_handles(&mut self) -> FileResult<()> {
        if let ArchiveHandle::Write(mut writer) =
            std::mem::replace(&mut self.handle, ArchiveHandle::Closed)
        {
            let file = writer.finish().map_err(|e| {
                warn!("Failed to finalize zip archive {:?}: {}", self.base_path, e);
                archive_error(e)
            })?;
            file.sync_all()?;
            debug!("Finalized zip archive {:?}", self.base_path);
        }
        Ok(())
    }

    fn switch_to_read(&mut self) -> FileResult<&mut ZipArchive<File>> {
        let base = self.base()?;

        let fresh = match &self.handle {
            ArchiveHandle::Read { stamp, .. } => ArchiveStamp::of(&base)
                .map(|current| current == *stamp)
                .unwrap_or(false),
            _ => false,
        };

        if !fresh {
            if matches!(self.handle, ArchiveHandle::Read { .. }) {
                debug!("Zip archive {:?} changed on disk, reopening", base);
            }
            self.close_handles()?;

            let stamp = ArchiveStamp::of(&base)?;
            let file = File::open(&base).map_err(|e| FileError::from_io(e, &base))?;
            let archive = ZipArchive::new(file).map_err(|e| {
                warn!("Failed to open zip archive {:?}: {}", base, e);
                archive_error(e)
            })?;
            self.handle = ArchiveHandle::Read { archive, stamp };
        }

        match &mut self.handle {
            ArchiveHandle::Read { archive, .. } => Ok(archive),
            _ => Err(FileError::Internal {
                message: "zip read handle missing after open".to_string(),
            }),
        }
    }

    fn switch_to_write(&mut self) -> FileResult<&mut ZipWriter<File>> {
        let base = self.base()?;

        if !matches!(self.handle, ArchiveHandle::Write(_)) {
            self.close_handles()?;

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&base)
                .map_err(|e| FileError::from_io(e, &base))?;
            let writer = ZipWriter::new_append(file).map_err(|e| {
                warn!("Failed to open zip archive {:?} for writing: {}", base, e);
                archive_error(e)
            })?;
            self.handle = ArchiveHandle::Write(writer);
        }

        match &mut self.handle {
            ArchiveHandle::Write(writer) => Ok(writer),
            _ => Err(FileError::Internal {
                message: "zip write handle missing after open".to_string(),
            }),
        }
    }

    /// Find the archive entry name for a relative path.
    ///
    /// An exact match wins; otherwise the first name (in sorted order) that
    /// matches under the crate-wide case policy. Only the central directory
    /// is consulted, so a damaged entry elsewhere does not hide this one.
    fn locate_entry(&mut self, relative: &str) -> FileResult<String> {
        let archive = self.switch_to_read()?;

        let mut candidates: Vec<&str> = archive
            .file_names()
            .filter(|name| names_equal(name, relative))
            .collect();
        if candidates.contains(&relative) {
            return Ok(relative.to_string());
        }

        candidates.sort_unstable();
        candidates
            .first()
            .map(|name| name.to_string())
            .ok_or_else(|| FileError::not_found(relative))
    }

    fn write_options() -> FileOptions {
        let now = Local::now();
        let timestamp = zip::DateTime::from_date_and_time(
            now.year() as u16,
            now.month() as u8,
            now.day() as u8,
            now.hour() as u8,
            now.minute() as u8,
            now.second() as u8,
        )
        .unwrap_or_default();

        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(timestamp)
            .unix_permissions(0o644)
    }

    fn add_readme(writer: &mut ZipWriter<File>) -> FileResult<()> {
        writer
            .start_file(ZIP_README_FILE, Self::write_options())
            .map_err(archive_error)?;
        writer.write_all(ZIP_GLOBAL_COMMENT.as_bytes())?;
        Ok(())
    }

    fn create_archive(path: &Path) -> FileResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FileError::from_io(e, parent))?;
        }

        let file = File::create(path).map_err(|e| FileError::from_io(e, path))?;
        let mut writer = ZipWriter::new(file);
        writer.set_comment(ZIP_GLOBAL_COMMENT);
        Self::add_readme(&mut writer)?;
        writer.finish().map_err(archive_error)?.sync_all()?;
        Ok(())
    }

    /// Rewrite the archive without the entry named `target`.
    ///
    /// Every other entry keeps its compression method, timestamp,
    /// permissions, extra fields and comment. The archive comment is carried over and
    /// the `.readme` entry is seeded again at the front. Entry data is
    /// decompressed and checked on the way, so a damaged entry aborts the
    /// rewrite before the original is replaced.
    fn rewrite_without(&mut self, target: &str) -> FileResult<()> {
        let base = self.base()?;
        let parent = base
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let temp = tempfile::Builder::new()
            .prefix(TEMP_ZIP_PREFIX)
            .suffix(".zip")
            .tempfile_in(&parent)
            .map_err(|e| FileError::from_io(e, &parent))?;
        let temp_path = temp.path().to_path_buf();
        let temp_file = temp
            .as_file()
            .try_clone()
            .map_err(|e| FileError::from_io(e, &temp_path))?;

        {
            let archive = self.switch_to_read()?;
            let mut writer = ZipWriter::new(temp_file);
            writer.set_comment(String::from_utf8_lossy(archive.comment()).into_owned());
            Self::add_readme(&mut writer)?;

            let mut comments = HashMap::new();
            for index in 0..archive.len() {
                let mut entry = archive.by_index(index).map_err(|e| {
                    warn!("Failed to copy entry {} of {:?}: {}", index, base, e);
                    archive_error(e)
                })?;
                let name = entry.name().to_string();
                if name == ZIP_README_FILE || name == target {
                    continue;
                }
                if !entry.comment().is_empty() {
                    comments.insert(name.clone(), entry.comment().as_bytes().to_vec());
                }

                let mut options = FileOptions::default()
                    .compression_method(entry.compression())
                    .last_modified_time(entry.last_modified())
                    .large_file(entry.compressed_size().max(entry.size()) > ZIP64_LIMIT);
                if let Some(mode) = entry.unix_mode() {
                    options = options.unix_permissions(mode);
                }

                if entry.is_dir() {
                    writer
                        .add_directory(name.as_str(), options)
                        .map_err(archive_error)?;
                    continue;
                }

                let extra = without_zip64_fields(entry.extra_data());
                writer
                    .start_file_with_extra_data(name.as_str(), options)
                    .map_err(archive_error)?;
                writer.write_all(&extra)?;
                writer.end_extra_data().map_err(archive_error)?;
                Self::copy_entry(&mut entry, &mut writer, &name, &temp_path)?;
            }

            let mut file = writer.finish().map_err(archive_error)?;
            restore_entry_comments(&mut file, &comments)
                .map_err(|e| FileError::from_io(e, &temp_path))?;
            file.sync_all()?;
        }

        self.close_handles()?;
        temp.persist(&base).map_err(|e| {
            warn!("Failed to replace zip archive {:?}: {}", base, e.error);
            FileError::from_io(e.error, &base)
        })?;
        info!("Removed {} from zip archive {:?}", target, base);

        self.switch_to_read().map(|_| ())
    }

    fn copy_entry(
        entry: &mut impl Read,
        output: &mut impl Write,
        name: &str,
        target: &Path,
    ) -> FileResult<()> {
        let mut buffer = vec![0u8; EXTRACT_CHUNK_SIZE];
        loop {
            let count = match entry.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(FileError::CorruptedArchive {
                        reason: format!("{}: {}", name, e),
                    })
                }
            };
            output
                .write_all(&buffer[..count])
                .map_err(|e| FileError::from_io(e, target))?;
        }
        output.flush().map_err(|e| FileError::from_io(e, target))
    }
}

/// Drop zip64 blocks from an extra field; the writer emits its own.
fn without_zip64_fields(extra: &[u8]) -> Vec<u8> {
    let mut kept = Vec::with_capacity(extra.len());
    let mut rest = extra;
    while rest.len() >= 4 {
        let kind = u16::from_le_bytes([rest[0], rest[1]]);
        let size = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let end = (4 + size).min(rest.len());
        if kind != ZIP64_EXTRA_FIELD {
            kept.extend_from_slice(&rest[..end]);
        }
        rest = &rest[end..];
    }
    kept
}

fn read_u16(bytes: &[u8], at: usize) -> usize {
    u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize
}

fn read_u32(bytes: &[u8], at: usize) -> u64 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as u64
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Put entry comments back into the central directory of a finished
/// archive, keyed by entry name.
///
/// The zip writer always leaves entry comments empty. Archives that needed
/// zip64 end records are left as they are.
fn restore_entry_comments(
    file: &mut File,
    comments: &HashMap<String, Vec<u8>>,
) -> io::Result<()> {
    if comments.is_empty() {
        return Ok(());
    }

    let len = file.seek(SeekFrom::End(0))?;
    let tail_len = len.min((END_OF_CENTRAL_LEN + u16::MAX as usize) as u64);
    let mut tail = vec![0u8; tail_len as usize];
    file.seek(SeekFrom::Start(len - tail_len))?;
    file.read_exact(&mut tail)?;
    if tail.len() < END_OF_CENTRAL_LEN {
        return Err(invalid_data("archive too short"));
    }

    // The end record is followed only by the archive comment.
    let end = (0..=tail.len() - END_OF_CENTRAL_LEN)
        .rev()
        .find(|&pos| {
            tail[pos..pos + 4] == END_OF_CENTRAL_SIGNATURE
                && pos + END_OF_CENTRAL_LEN + read_u16(&tail, pos + 20) == tail.len()
        })
        .ok_or_else(|| invalid_data("end of central directory not found"))?;
    let mut end_record = tail[end..].to_vec();

    let entries = read_u16(&end_record, 10);
    let central_size = read_u32(&end_record, 12);
    let central_start = read_u32(&end_record, 16);
    if entries == u16::MAX as usize
        || central_size == u32::MAX as u64
        || central_start == u32::MAX as u64
        || central_start + central_size != len - tail_len + end as u64
    {
        warn!("Entry comments are not restored in zip64 archives");
        return Ok(());
    }

    let mut central = vec![0u8; central_size as usize];
    file.seek(SeekFrom::Start(central_start))?;
    file.read_exact(&mut central)?;

    let mut rebuilt = Vec::with_capacity(central.len());
    let mut pos = 0;
    for _ in 0..entries {
        if pos + CENTRAL_HEADER_LEN > central.len()
            || central[pos..pos + 4] != CENTRAL_HEADER_SIGNATURE
        {
            return Err(invalid_data("malformed central directory"));
        }
        let name_len = read_u16(&central, pos + 28);
        let extra_len = read_u16(&central, pos + 30);
        let comment_len = read_u16(&central, pos + 32);
        let header_end = pos + CENTRAL_HEADER_LEN + name_len + extra_len;
        let record_end = header_end + comment_len;
        if record_end > central.len() {
            return Err(invalid_data("malformed central directory"));
        }

        let name = &central[pos + CENTRAL_HEADER_LEN..pos + CENTRAL_HEADER_LEN + name_len];
        let comment = std::str::from_utf8(name)
            .ok()
            .and_then(|name| comments.get(name))
            .map(|comment| &comment[..comment.len().min(u16::MAX as usize)]);

        let start = rebuilt.len();
        match comment {
            Some(comment) => {
                rebuilt.extend_from_slice(&central[pos..header_end]);
                rebuilt[start + 32..start + 34]
                    .copy_from_slice(&(comment.len() as u16).to_le_bytes());
                rebuilt.extend_from_slice(comment);
            }
            None => rebuilt.extend_from_slice(&central[pos..record_end]),
        }
        pos = record_end;
    }

    let rebuilt_size = u32::try_from(rebuilt.len())
        .map_err(|_| invalid_data("central directory too large"))?;
    end_record[12..16].copy_from_slice(&rebuilt_size.to_le_bytes());

    file.set_len(central_start)?;
    file.seek(SeekFrom::Start(central_start))?;
    file.write_all(&rebuilt)?;
    file.write_all(&end_record)?;
    file.flush()
}

/// Interpret a DOS timestamp as local time
fn dos_time_to_system_time(time: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?
        .and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(SystemTime::from(local))
}

impl Default for ZipFileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ZipFileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handle = match self.handle {
            ArchiveHandle::Closed => "closed",
            ArchiveHandle::Read { .. } => "read",
            ArchiveHandle::Write(_) => "write",
        };
        f.debug_struct("ZipFileManager")
            .field("base_path", &self.base_path)
            .field("handle", &handle)
            .finish()
    }
}

impl Drop for ZipFileManager {
    fn drop(&mut self) {
        if let Err(e) = self.close_handles() {
            warn!("Failed to close zip archive {:?}: {}", self.base_path, e);
        }
    }
}

impl FileManager for ZipFileManager {
    fn is_valid(&self) -> bool {
        self.base_path.is_some()
    }

    fn init(&mut self, base_path: &Path, create: bool) -> FileResult<()> {
        if base_path.as_os_str().is_empty() {
            return Err(FileError::invalid_path(""));
        }
        let path = absolute_path(base_path).map_err(|e| FileError::from_io(e, base_path))?;

        if let Err(e) = self.close_handles() {
            warn!("Failed to close previous zip archive: {}", e);
        }
        self.base_path = None;
        self.scratch.clear();

        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => {
                self.base_path = Some(path.clone());
                let opened = self.switch_to_read().map(|_| ());
                if let Err(e) = opened {
                    self.base_path = None;
                    return Err(e);
                }
                info!("Zip file manager initialized for {:?}", path);
            }
            Ok(_) => {
                debug!("Not a zip file: {:?}", path);
                return Err(FileError::invalid_path(path.display().to_string()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && create => {
                Self::create_archive(&path)?;
                info!("Created zip archive {:?}", path);
                self.base_path = Some(path);
            }
            Err(e) => return Err(FileError::from_io(e, &path)),
        }
        Ok(())
    }

    fn read_file(&mut self, file: &str) -> FileResult<Vec<u8>> {
        let relative = self.check_path(file)?;
        let name = self.locate_entry(&relative)?;

        let archive = self.switch_to_read()?;
        let entry = archive.by_name(&name).map_err(archive_error)?;
        if entry.size() > MAX_FILE_SIZE {
            warn!("{} is too large to read into memory", name);
            return Err(FileError::TooLarge {
                path: name,
                limit: MAX_FILE_SIZE,
            });
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .take(MAX_FILE_SIZE + 1)
            .read_to_end(&mut data)
            .map_err(|e| {
                warn!("Failed to decompress {}: {}", name, e);
                FileError::CorruptedArchive {
                    reason: format!("{}: {}", name, e),
                }
            })?;
        if data.len() as u64 > MAX_FILE_SIZE {
            return Err(FileError::TooLarge {
                path: name,
                limit: MAX_FILE_SIZE,
            });
        }
        Ok(data)
    }

    fn write_file(&mut self, file: &str, data: &[u8], overwrite: bool) -> FileResult<()> {
        let relative = self.check_path(file)?;

        match self.locate_entry(&relative) {
            Ok(existing) => {
                if !overwrite {
                    debug!("Can't overwrite existing entry {}", existing);
                    return Err(FileError::AlreadyExists { path: existing });
                }
                self.rewrite_without(&existing)?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let options = Self::write_options();
        let writer = self.switch_to_write()?;
        writer
            .start_file(relative.as_str(), options)
            .map_err(archive_error)?;
        writer.write_all(data)?;
        debug!("Wrote {} ({} bytes) into zip archive", relative, data.len());
        Ok(())
    }

    fn remove_file(&mut self, file: &str) -> FileResult<()> {
        let relative = self.check_path(file)?;
        let name = self.locate_entry(&relative)?;
        self.rewrite_without(&name)
    }

    fn extract_file(&mut self, file: &str, into_file: Option<&Path>) -> FileResult<PathBuf> {
        let relative = self.check_path(file)?;
        let name = self.locate_entry(&relative)?;

        let target = match into_file {
            Some(path) => path.to_path_buf(),
            None => {
                let base = self.base()?;
                self.scratch.ensure(&base)?.join(&name)
            }
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FileError::from_io(e, parent))?;
        }

        let archive = self.switch_to_read()?;
        let mut entry = archive.by_name(&name).map_err(archive_error)?;
        let mut output = File::create(&target).map_err(|e| FileError::from_io(e, &target))?;

        if let Err(e) = Self::copy_entry(&mut entry, &mut output, &name, &target) {
            drop(output);
            if let Err(remove_err) = fs::remove_file(&target) {
                debug!("Failed to remove partial file {:?}: {}", target, remove_err);
            }
            warn!("Failed to extract {} to {:?}: {}", name, target, e);
            return Err(e);
        }
        Ok(target)
    }

    fn file_exists(&mut self, file: &str) -> bool {
        match self.check_path(file) {
            Ok(relative) => self.locate_entry(&relative).is_ok(),
            Err(_) => false,
        }
    }

    fn is_directly_accessible(&self, _file: &str) -> bool {
        false
    }

    fn full_path(&self, file: &str) -> Option<PathBuf> {
        let base = self.base_path.as_ref()?;
        if file.is_empty() {
            return Some(base.clone());
        }
        relative_file_path(file).map(|relative| base.join(relative))
    }

    fn last_modified_time(&mut self, file: &str) -> FileResult<SystemTime> {
        let relative = self.check_path(file)?;
        let name = self.locate_entry(&relative)?;

        let archive = self.switch_to_read()?;
        let modified = archive
            .by_name(&name)
            .map_err(archive_error)?
            .last_modified();
        dos_time_to_system_time(modified).ok_or_else(|| FileError::CorruptedArchive {
            reason: format!("{}: invalid timestamp", name),
        })
    }

    fn enumerate_files(
        &mut self,
        dir: &str,
        callback: &mut dyn FnMut(&str) -> bool,
    ) -> FileResult<EnumerateStatus> {
        let dir = normalize_file_path(dir);
        if !dir.is_empty() && relative_file_path(&dir).is_none() {
            return Err(FileError::invalid_path(dir));
        }
        let dir_prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let archive = self.switch_to_read()?;
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(archive_error)?;
            if entry.is_dir() || entry.name() == ZIP_README_FILE {
                continue;
            }
            if let Some(name) = strip_path_prefix(entry.name(), &dir_prefix) {
                if !callback(name) {
                    return Ok(EnumerateStatus::Canceled);
                }
            }
        }
        Ok(EnumerateStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn build_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
                continue;
            }
            writer.start_file(*name, options).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| *window == needle)
            .map(|(pos, _)| pos)
            .collect()
    }

    #[test]
    fn test_create_new_archive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("new/package.gg");

        assert_matches!(
            ZipFileManager::create(&path, false),
            Err(FileError::NotFound { .. })
        );

        let mut fm = ZipFileManager::create(&path, true).unwrap();
        assert!(fm.is_valid());
        assert!(path.is_file());
        assert_eq!(fm.full_path(""), Some(path.clone()));
        assert!(fm.list_files("").unwrap().is_empty());
        assert_eq!(
            fm.read_file(ZIP_README_FILE).unwrap(),
            ZIP_GLOBAL_COMMENT.as_bytes()
        );

        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.comment(), ZIP_GLOBAL_COMMENT.as_bytes());
    }

    #[test]
    fn test_init_rejects_non_archives() {
        let temp_dir = TempDir::new().unwrap();
        assert_matches!(
            ZipFileManager::create(temp_dir.path(), true),
            Err(FileError::InvalidPath { .. })
        );

        let garbage = temp_dir.path().join("garbage.gg");
        std::fs::write(&garbage, b"definitely not a zip file").unwrap();
        let mut fm = ZipFileManager::new();
        assert_matches!(
            fm.init(&garbage, false),
            Err(FileError::CorruptedArchive { .. })
        );
        assert!(!fm.is_valid());
        assert_matches!(fm.read_file("main.xml"), Err(FileError::NotInitialized));
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");
        let mut fm = ZipFileManager::create(&path, true).unwrap();

        fm.write_file("main.xml", b"<view/>", false).unwrap();
        fm.write_file("zh_CN/strings.xml", b"<strings/>", false).unwrap();
        assert_eq!(fm.read_file("main.xml").unwrap(), b"<view/>");
        assert_eq!(fm.read_file("zh_CN/strings.xml").unwrap(), b"<strings/>");

        assert_matches!(
            fm.write_file("main.xml", b"<other/>", false),
            Err(FileError::AlreadyExists { .. })
        );
        fm.write_file("main.xml", b"<other/>", true).unwrap();
        assert_eq!(fm.read_file("main.xml").unwrap(), b"<other/>");
        assert_eq!(fm.list_files("").unwrap(), vec!["zh_CN/strings.xml", "main.xml"]);

        drop(fm);
        let mut reopened = ZipFileManager::create(&path, false).unwrap();
        assert_eq!(reopened.read_file("main.xml").unwrap(), b"<other/>");
    }

    #[test]
    fn test_remove_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");
        let mut fm = ZipFileManager::create(&path, true).unwrap();
        fm.write_file("a.txt", b"a", false).unwrap();
        fm.write_file("b.txt", b"b", false).unwrap();

        fm.remove_file("a.txt").unwrap();
        assert!(!fm.file_exists("a.txt"));
        assert_eq!(fm.read_file("b.txt").unwrap(), b"b");
        assert!(fm.file_exists(ZIP_README_FILE));
        assert_matches!(fm.remove_file("a.txt"), Err(FileError::NotFound { .. }));

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);

        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.comment(), ZIP_GLOBAL_COMMENT.as_bytes());
    }

    #[test]
    fn test_remove_keeps_entry_metadata() {
        const EXTRA: [u8; 8] = [0xFE, 0xCA, 0x04, 0x00, 0x01, 0x02, 0x03, 0x04];

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");
        let modified = zip::DateTime::from_date_and_time(2009, 6, 15, 10, 30, 0).unwrap();
        {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .unwrap();
            let mut writer = ZipWriter::new(file);
            let stored = FileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(modified)
                .unix_permissions(0o600);
            writer.start_file_with_extra_data("keep.txt", stored).unwrap();
            writer.write_all(&EXTRA).unwrap();
            writer.end_extra_data().unwrap();
            writer.write_all(b"kept").unwrap();

            let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file("gone.txt", deflated).unwrap();
            writer.write_all(b"gone").unwrap();
            writer.start_file("note.txt", deflated).unwrap();
            writer.write_all(b"note").unwrap();

            let mut file = writer.finish().unwrap();
            let comments = HashMap::from([("note.txt".to_string(), b"translated".to_vec())]);
            restore_entry_comments(&mut file, &comments).unwrap();
        }

        {
            let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
            assert_eq!(archive.by_name("note.txt").unwrap().comment(), "translated");
        }

        let mut fm = ZipFileManager::create(&path, false).unwrap();
        fm.remove_file("gone.txt").unwrap();
        drop(fm);

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert!(archive.by_name("gone.txt").is_err());
        {
            let mut keep = archive.by_name("keep.txt").unwrap();
            assert_eq!(keep.extra_data(), &EXTRA[..]);
            assert_eq!(keep.compression(), CompressionMethod::Stored);
            assert_eq!(keep.last_modified().year(), 2009);
            assert_eq!(keep.last_modified().hour(), 10);
            assert_eq!(keep.unix_mode().map(|mode| mode & 0o777), Some(0o600));
            let mut data = String::new();
            keep.read_to_string(&mut data).unwrap();
            assert_eq!(data, "kept");
        }
        let mut note = archive.by_name("note.txt").unwrap();
        assert_eq!(note.comment(), "translated");
        assert_eq!(note.compression(), CompressionMethod::Deflated);
        let mut data = String::new();
        note.read_to_string(&mut data).unwrap();
        assert_eq!(data, "note");
    }

    #[test]
    fn test_enumerate_in_directory_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.zip");
        build_archive(
            &path,
            &[
                ("main.xml", "m"),
                ("en/", ""),
                ("en/strings.xml", "s"),
                (ZIP_README_FILE, "r"),
                ("en/big_file", "b"),
                ("global_file", "g"),
            ],
        );

        let mut fm = ZipFileManager::create(&path, false).unwrap();
        assert_eq!(
            fm.list_files("").unwrap(),
            vec!["main.xml", "en/strings.xml", "en/big_file", "global_file"]
        );
        assert_eq!(fm.list_files("en").unwrap(), vec!["strings.xml", "big_file"]);
        assert_eq!(fm.list_files("en/").unwrap(), vec!["strings.xml", "big_file"]);
        assert!(fm.list_files("fr").unwrap().is_empty());
        assert_matches!(
            fm.enumerate_files("../up", &mut |_| true),
            Err(FileError::InvalidPath { .. })
        );

        let mut seen = Vec::new();
        let status = fm
            .enumerate_files("", &mut |name| {
                seen.push(name.to_string());
                seen.len() < 2
            })
            .unwrap();
        assert_eq!(status, EnumerateStatus::Canceled);
        assert_eq!(seen, vec!["main.xml", "en/strings.xml"]);
    }

    #[cfg(not(feature = "case-sensitive"))]
    #[test]
    fn test_lookup_ignores_case() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.zip");
        build_archive(&path, &[("Main.xml", "upper"), ("main.XML", "lower")]);

        let mut fm = ZipFileManager::create(&path, false).unwrap();
        assert_eq!(fm.read_file("main.XML").unwrap(), b"lower");
        assert_eq!(fm.read_file("MAIN.xml").unwrap(), b"upper");
        assert!(fm.file_exists("MAIN.XML"));
    }

    #[test]
    fn test_stale_read_handle_is_reopened() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");

        let mut first = ZipFileManager::create(&path, true).unwrap();
        first.write_file("main.xml", b"one", false).unwrap();
        assert_eq!(first.read_file("main.xml").unwrap(), b"one");

        {
            let mut second = ZipFileManager::create(&path, false).unwrap();
            second.write_file("strings.xml", b"two", false).unwrap();
        }

        assert_eq!(first.read_file("strings.xml").unwrap(), b"two");
    }

    #[test]
    fn test_failed_remove_leaves_archive_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.zip");
        build_archive(
            &path,
            &[("a.txt", "alpha"), ("b.txt", "bravo"), ("c.txt", "charlie")],
        );

        // Break the local header of b.txt; the central directory stays intact.
        let mut bytes = std::fs::read(&path).unwrap();
        let headers = find_all(&bytes, b"PK\x03\x04");
        assert_eq!(headers.len(), 3);
        bytes[headers[1]] = b'X';
        std::fs::write(&path, &bytes).unwrap();

        let mut fm = ZipFileManager::create(&path, false).unwrap();
        assert!(fm.remove_file("c.txt").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert_eq!(fm.read_file("a.txt").unwrap(), b"alpha");
        assert_eq!(fm.read_file("c.txt").unwrap(), b"charlie");

        let leftovers = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_crc_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.zip");
        build_archive(&path, &[("data.txt", "resource payload")]);

        let mut bytes = std::fs::read(&path).unwrap();
        let pos = find_all(&bytes, b"resource payload")[0];
        bytes[pos] = b'R';
        std::fs::write(&path, &bytes).unwrap();

        let mut fm = ZipFileManager::create(&path, false).unwrap();
        assert_matches!(
            fm.read_file("data.txt"),
            Err(FileError::CorruptedArchive { .. })
        );

        let target = temp_dir.path().join("out/data.txt");
        assert_matches!(
            fm.extract_file("data.txt", Some(&target)),
            Err(FileError::CorruptedArchive { .. })
        );
        assert!(!target.exists());
    }

    #[test]
    fn test_too_large_entry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");
        let mut fm = ZipFileManager::create(&path, true).unwrap();

        let big = vec![0u8; (MAX_FILE_SIZE + 1) as usize];
        fm.write_file("zh_CN/big_file", &big, false).unwrap();
        assert_matches!(
            fm.read_file("zh_CN/big_file"),
            Err(FileError::TooLarge { limit, .. }) if limit == MAX_FILE_SIZE
        );

        let extracted = fm.extract_file("zh_CN/big_file", None).unwrap();
        assert_eq!(std::fs::metadata(&extracted).unwrap().len(), MAX_FILE_SIZE + 1);
    }

    #[test]
    fn test_extract_to_scratch_is_cleaned_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");
        let mut fm = ZipFileManager::create(&path, true).unwrap();
        fm.write_file("1033/strings.xml", b"hello", false).unwrap();

        let extracted = fm.extract_file("1033/strings.xml", None).unwrap();
        assert!(extracted.ends_with("1033/strings.xml"));
        assert_eq!(std::fs::read(&extracted).unwrap(), b"hello");

        drop(fm);
        assert!(!extracted.exists());
    }

    #[test]
    fn test_metadata_queries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("package.gg");
        let mut fm = ZipFileManager::create(&path, true).unwrap();
        fm.write_file("main.xml", b"<view/>", false).unwrap();

        let modified = fm.last_modified_time("main.xml").unwrap();
        let now = SystemTime::now();
        let delta = match now.duration_since(modified) {
            Ok(delta) => delta,
            Err(e) => e.duration(),
        };
        assert!(delta.as_secs() < 120);

        assert!(!fm.is_directly_accessible("main.xml"));
        assert_eq!(fm.full_path("main.xml"), Some(path.join("main.xml")));
        assert_eq!(fm.full_path("../main.xml"), None);
        assert_matches!(
            fm.last_modified_time("missing.xml"),
            Err(FileError::NotFound { .. })
        );
    }
}
