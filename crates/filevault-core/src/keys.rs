//! String helpers shared by relative paths and absolute object keys.

pub const DELIMITER: &str = "/";

pub fn is_directory_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Parent of `path` including its trailing `/`, or `""` at the top level.
///
/// `"a/b/x.txt"` and `"a/b/c/"` both have the parent `"a/b/"`.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

/// Last segment of `path` without any trailing `/`.
pub fn resource_name(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Every directory prefix above `path`, outermost first.
pub fn ancestor_directories(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed
        .match_indices('/')
        .map(move |(idx, _)| &path[..=idx])
}
