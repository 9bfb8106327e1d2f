//! Lexical path algebra. Nothing here touches the filesystem.
//!
//! Paths use `/` as separator. `normalize` collapses repeated separators,
//! drops `.` segments and resolves `..` against preceding segments; a leading
//! `..` on a relative path is kept, one above the root is dropped.

use serde::Serialize;

/// Result of [`split`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathParts {
    /// Everything up to and including the last `/`, empty if none.
    pub folder: String,
    /// Last segment.
    pub file: String,
    /// `file` without its extension.
    pub title: String,
    /// Extension including the dot, empty if none.
    pub ext: String,
}

/// Lexically clean `path`. An empty path becomes `.`.
#[must_use]
pub fn normalize(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {},
            ".." => match out.last().copied() {
                Some(last) if last != ".." => {
                    out.pop();
                },
                _ if rooted => {},
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    let body = out.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_owned(),
        (false, false) => body,
    }
}

/// Split the normalized path into folder and file.
#[must_use]
pub fn split(path: &str) -> PathParts {
    let clean = normalize(path);
    let (folder, file) = match clean.rfind('/') {
        Some(idx) => clean.split_at(idx.saturating_add(1)),
        None => ("", clean.as_str()),
    };
    let (title, ext) = match file.rfind('.') {
        Some(0) | None => (file, ""),
        Some(idx) => file.split_at(idx),
    };
    PathParts {
        folder: folder.to_owned(),
        file: file.to_owned(),
        title: title.to_owned(),
        ext: ext.to_owned(),
    }
}

/// Join segments and normalize. Empty segments are ignored.
#[must_use]
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

/// Absolute form of `path`, joined onto `cwd` unless already absolute.
#[must_use]
pub fn abs(path: &str, cwd: &str) -> String {
    if path.starts_with('/') {
        normalize(path)
    } else {
        join(&[cwd, path])
    }
}
