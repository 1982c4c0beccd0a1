//! Path helpers that treat `\` and `/` alike, so Windows-style folder paths
//! captured in snapshots behave the same on every host.

use std::io;

fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// Lookup key for a folder path, without trailing separators.
///
/// Absolute POSIX paths keep their case. Windows-style paths (drive letter,
/// UNC, relative) fold case and separators.
pub fn path_key(path: &str) -> String {
    let trimmed = trim_trailing(path);
    if is_posix_path(trimmed) {
        trimmed.to_string()
    } else {
        trimmed.replace('/', "\\").to_lowercase()
    }
}

fn is_posix_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

/// Parent folder of `path`, or `None` for a root such as `C:\`, `\\server\share` or `/`.
pub fn parent_folder(path: &str) -> Option<&str> {
    let trimmed = trim_trailing(path);
    if is_unc_share_prefix(trimmed) {
        return None;
    }
    let idx = trimmed.rfind(is_separator)?;
    if idx + 1 == trimmed.len() {
        // "C:\" or "/"
        return None;
    }
    let parent = &trimmed[..idx];
    if parent.is_empty() {
        return Some(&trimmed[..1]);
    }
    if parent.ends_with(':') {
        return Some(&trimmed[..=idx]);
    }
    Some(parent)
}

/// Last path component.
pub fn folder_name(path: &str) -> &str {
    let trimmed = trim_trailing(path);
    match trimmed.rfind(is_separator) {
        Some(idx) if idx + 1 < trimmed.len() => &trimmed[idx + 1..],
        _ => trimmed,
    }
}

/// Windows reports ERROR_FILENAME_EXCED_RANGE (206), Unix ENAMETOOLONG (36).
pub fn is_path_too_long(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(206) | Some(36))
}

fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        // keep "/" or "\" as-is
        &path[..path.len().min(1)]
    } else if trimmed.ends_with(':') {
        // keep "C:\" distinct from "C:"
        &path[..(trimmed.len() + 1).min(path.len())]
    } else {
        trimmed
    }
}

fn is_unc_share_prefix(path: &str) -> bool {
    // "\\server" or "\\server\share"
    let rest = match path.strip_prefix("\\\\") {
        Some(rest) => rest,
        None => return false,
    };
    rest.split('\\').filter(|s| !s.is_empty()).count() <= 2
}
