//! Subcommand implementations
//!
//! Every command works on any `FileManager`, so the global wrapper and the
//! test doubles go through the same code.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::debug;

use resfs_shared::{FileManager, FileManagerWrapper};

/// Print every file under `dir`, one per line
pub fn list(fm: &mut dyn FileManager, dir: &str, out: &mut dyn Write) -> Result<()> {
    let mut write_error = None;
    let status = fm
        .enumerate_files(dir, &mut |name: &str| match writeln!(out, "{name}") {
            Ok(()) => true,
            Err(e) => {
                write_error = Some(e);
                false
            }
        })
        .with_context(|| format!("Failed to list {dir:?}"))?;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write listing");
    }
    debug!("Listing of {:?} finished: {:?}", dir, status);
    Ok(())
}

/// Copy a file's contents to `out`
pub fn cat(fm: &mut dyn FileManager, file: &str, out: &mut dyn Write) -> Result<()> {
    let data = fm
        .read_file(file)
        .with_context(|| format!("Failed to read {file:?}"))?;
    out.write_all(&data).context("Failed to write file contents")?;
    Ok(())
}

/// Store the contents of a host file under `file`
pub fn put(fm: &mut dyn FileManager, file: &str, source: &Path, overwrite: bool) -> Result<()> {
    let data = fs::read(source).with_context(|| format!("Failed to read {source:?}"))?;
    fm.write_file(file, &data, overwrite)
        .with_context(|| format!("Failed to write {file:?}"))?;
    Ok(())
}

pub fn remove(fm: &mut dyn FileManager, file: &str) -> Result<()> {
    fm.remove_file(file)
        .with_context(|| format!("Failed to remove {file:?}"))
}

/// Extract a file onto disk and print where it went
pub fn extract(
    fm: &mut dyn FileManager,
    file: &str,
    into: Option<&Path>,
    out: &mut dyn Write,
) -> Result<()> {
    let path = fm
        .extract_file(file, into)
        .with_context(|| format!("Failed to extract {file:?}"))?;
    writeln!(out, "{}", path.display())?;
    Ok(())
}

/// Print what the file manager knows about a file
pub fn stat(fm: &mut dyn FileManager, file: &str, out: &mut dyn Write) -> Result<()> {
    if !fm.file_exists(file) {
        anyhow::bail!("{file:?} does not exist");
    }

    // Timestamps don't resolve through locale directories and oversized
    // files can't be read; print "-" for either.
    let size = match fm.read_file(file) {
        Ok(data) => data.len().to_string(),
        Err(e) => {
            debug!("Size of {:?} unavailable: {}", file, e);
            "-".to_string()
        }
    };
    let modified = match fm.last_modified_time(file) {
        Ok(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(e) => {
            debug!("Timestamp of {:?} unavailable: {}", file, e);
            "-".to_string()
        }
    };

    writeln!(out, "file:     {file}")?;
    writeln!(out, "size:     {size}")?;
    writeln!(out, "modified: {modified}")?;
    match fm.full_path(file) {
        Some(path) => writeln!(out, "path:     {}", path.display())?,
        None => writeln!(out, "path:     -")?,
    }
    writeln!(out, "direct:   {}", fm.is_directly_accessible(file))?;
    Ok(())
}

/// Print the registered prefixes in lookup order
pub fn mounts(wrapper: &FileManagerWrapper, out: &mut dyn Write) -> Result<()> {
    for prefix in wrapper.registered_prefixes() {
        let base = wrapper
            .full_path(prefix)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "{prefix:<16} {base}")?;
    }
    if wrapper.has_default() {
        let base = wrapper
            .full_path("")
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "{:<16} {base}", "(default)")?;
    }
    Ok(())
}
