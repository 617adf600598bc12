//! Path helpers shared by the gamelist store and the scraper.
//!
//! Gamelist files store paths relative to the system start path (`./sub/game.zip`),
//! while the in-memory tree works with absolute paths. Every lookup key goes
//! through [`normalize`] so that `a/./b` and `a/c/../b` land on the same entry.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. The filesystem is never touched, so the path does not
/// need to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Return `path` relative to `base` when `path` lies inside `base`.
///
/// This is the containment check used when loading gamelists: `None` means the
/// path escapes the base directory.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = normalize(path);
    let base = normalize(base);
    path.strip_prefix(&base).ok().map(Path::to_path_buf)
}

/// Whether `path` is `base` itself or one of its descendants.
pub fn is_within(path: &Path, base: &Path) -> bool {
    relative_to(path, base).is_some()
}

/// Build the value written into gamelist XML for `path`.
///
/// Paths inside `base` become `./sub/file.ext` with forward slashes; anything
/// else is written as-is.
pub fn create_relative_path(path: &Path, base: &Path) -> String {
    match relative_to(path, base) {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) => {
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            format!("./{}", parts.join("/"))
        }
        None => path.to_string_lossy().into_owned(),
    }
}

/// Resolve a path value read from gamelist XML against `base`.
///
/// Handles `./relative`, `~/home-relative`, absolute paths and bare relative
/// paths. Empty values stay empty.
pub fn resolve_relative_path(value: &str, base: &Path) -> PathBuf {
    let value = value.trim();
    if value.is_empty() {
        return PathBuf::new();
    }

    let value = value.replace('\\', "/");
    if let Some(rest) = value.strip_prefix("./") {
        return normalize(&base.join(rest));
    }
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return normalize(&home.join(rest));
        }
    }

    let candidate = Path::new(&value);
    if candidate.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&base.join(candidate))
    }
}

/// File stem as an owned string, or an empty string when there is none.
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lowercased extension including the leading dot (`.zip`), or empty.
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Whether the final path component starts with a dot.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "tests/paths_tests.rs"]
mod tests;
