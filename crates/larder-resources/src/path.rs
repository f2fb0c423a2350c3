//! Logical resource path helpers.
//!
//! A resource path is a `/`-delimited logical name such as
//! `Sprites/Hero/Idle`. It carries no extension and no leading or trailing
//! slash; the empty path names the root.

/// Normalize a path: backslashes become `/`, empty segments are dropped.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Join a prefix and a path.
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = normalize(prefix);
    let path = normalize(path);
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path,
        (_, true) => prefix,
        _ => format!("{}/{}", prefix, path),
    }
}

/// Strip `prefix` from `full`, returning the remainder.
///
/// Returns `None` when `full` is not under `prefix`.
pub fn strip_prefix<'a>(prefix: &str, full: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(full);
    }
    if full == prefix {
        return Some("");
    }
    full.strip_prefix(prefix)?.strip_prefix('/')
}

/// The parent folder of a path (`""` for top-level names).
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

/// The last segment of a path.
pub fn file_name(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[idx + 1..]).unwrap_or(path)
}

/// Check whether `path` lies anywhere below `folder`.
///
/// The check respects segment boundaries: `Sprites/Hero2/Idle` is not
/// under `Sprites/Hero`.
pub fn is_under(folder: &str, path: &str) -> bool {
    if folder.is_empty() {
        return !path.is_empty();
    }
    path.len() > folder.len() + 1
        && path.starts_with(folder)
        && path.as_bytes()[folder.len()] == b'/'
}

/// The first segment of `path` below `folder`, when there is a deeper one.
///
/// For `folder = "Sprites"` and `path = "Sprites/Hero/Idle"` this is
/// `Sprites/Hero`. Returns `None` for direct children and unrelated paths.
pub fn child_folder(folder: &str, path: &str) -> Option<String> {
    if !is_under(folder, path) {
        return None;
    }
    let rest = if folder.is_empty() {
        path
    } else {
        &path[folder.len() + 1..]
    };
    let (segment, _) = rest.split_once('/')?;
    Some(join(folder, segment))
}
