//! Network path resolution
//!
//! Render nodes see the artist's files through a network share mapped to a
//! drive letter. This module works out which share backs a local path and
//! which drive the nodes should map it to, plus small helpers for Windows-style
//! paths that must be handled the same way on any submitting host.

mod resolver;
mod share;

pub use resolver::{NetworkLocation, PathResolver, DEFAULT_NET_DRIVE};
pub use share::{parse_net_use, FallbackLookup, NetUseLookup, ShareLookup, StaticShareTable};

/// Split a Windows path into its drive (`S:` or `\\server\share`) and the rest
pub fn split_drive(path: &str) -> (&str, &str) {
    if let Some(root) = unc_root_len(path) {
        return path.split_at(root);
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return path.split_at(2);
    }
    ("", path)
}

/// Byte length of a well-formed `\\server\share` prefix
pub(crate) fn unc_root_len(path: &str) -> Option<usize> {
    let is_sep = |c: char| c == '\\' || c == '/';
    let mut chars = path.char_indices();
    match (chars.next(), chars.next()) {
        (Some((_, a)), Some((_, b))) if is_sep(a) && is_sep(b) => {}
        _ => return None,
    }

    let rest = &path[2..];
    let server_end = rest.find(is_sep)?;
    if server_end == 0 {
        return None;
    }
    let after_server = &rest[server_end + 1..];
    let share_len = after_server.find(is_sep).unwrap_or(after_server.len());
    if share_len == 0 {
        return None;
    }
    Some(2 + server_end + 1 + share_len)
}

/// Join Windows path components with a single backslash
pub fn win_join(base: &str, part: &str) -> String {
    let base = base.trim_end_matches(['\\', '/']);
    let part = part.trim_start_matches(['\\', '/']);
    if base.is_empty() {
        part.to_string()
    } else {
        format!("{}\\{}", base, part)
    }
}

/// Parent directory of a Windows or POSIX style path
pub fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches(['\\', '/']);
    let idx = trimmed.rfind(['\\', '/'])?;
    Some(&trimmed[..idx]).filter(|p| !p.is_empty())
}

/// File name without directory or extension (`S:/foo/bar.ext` -> `bar`)
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['\\', '/']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}
