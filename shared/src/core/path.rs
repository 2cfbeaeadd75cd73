//! Path helpers shared by every file manager.
//!
//! Paths handed to a file manager are '/'-separated strings relative to the
//! manager's base. They are normalized lexically: `.` segments vanish, `..`
//! segments fold into their parent, and a path that still climbs above its
//! base is rejected. On Windows a '\\' in an API path is treated as '/'.

use std::borrow::Cow;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Separator used inside relative file paths and zip entry names.
pub const DIR_SEPARATOR: char = '/';

/// Translate host separators to '/'. A no-op everywhere but Windows.
pub fn normalize_separators(path: &str) -> Cow<'_, str> {
    if cfg!(windows) && path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Whether `path` is absolute on the host, or rooted with a '/'.
pub fn is_absolute_path(path: &str) -> bool {
    let path = normalize_separators(path);
    path.starts_with(DIR_SEPARATOR) || Path::new(path.as_ref()).is_absolute()
}

/// Lexically normalize a '/'-separated path.
///
/// Repeated separators collapse, `.` segments are dropped and `..` removes
/// the previous segment. A leading `/` is kept; a trailing one is not.
pub fn normalize_file_path(path: &str) -> String {
    let path = normalize_separators(path);
    let absolute = path.starts_with(DIR_SEPARATOR);

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(DIR_SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Validate a file name handed to a file manager and return its normalized
/// relative form. Empty, absolute and base-escaping paths yield `None`.
pub fn relative_file_path(file: &str) -> Option<String> {
    if file.is_empty() || is_absolute_path(file) {
        return None;
    }

    let normalized = normalize_file_path(file);
    if normalized.is_empty() || normalized == ".." || normalized.starts_with("../") {
        return None;
    }
    Some(normalized)
}

/// Join a directory and a name with exactly one separator between them.
pub fn build_file_path(dir: &str, name: &str) -> String {
    let trimmed_dir = dir.trim_end_matches(DIR_SEPARATOR);
    let name = name.trim_start_matches(DIR_SEPARATOR);

    if trimmed_dir.is_empty() {
        if dir.starts_with(DIR_SEPARATOR) {
            return format!("/{name}");
        }
        return name.to_string();
    }
    if name.is_empty() {
        return trimmed_dir.to_string();
    }
    format!("{trimmed_dir}/{name}")
}

/// Split a path into its directory part and its last segment.
pub fn split_file_path(path: &str) -> (&str, &str) {
    match path.rfind(DIR_SEPARATOR) {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Compare two names with the crate-wide case policy.
pub fn names_equal(a: &str, b: &str) -> bool {
    if cfg!(feature = "case-sensitive") {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Strip `prefix` from the front of `path` using the crate-wide case policy.
pub fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    if names_equal(head, prefix) {
        Some(&path[prefix.len()..])
    } else {
        None
    }
}

/// Resolve `path` against the current directory and normalize it.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize_path(&absolute))
}

/// Lexically normalize a host path without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
