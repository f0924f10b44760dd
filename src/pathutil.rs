//! Algebra over `/`-separated backend paths.
//!
//! Backends address entries with plain string paths, so relative-path
//! computation stays byte-exact across heterogeneous backends instead of
//! going through platform `Path` semantics.

use crate::errors::XmoveError;

/// Returns the suffix of `path` after removing `prefix`.
///
/// ```
/// # use xmove::pathutil::trim_prefix;
/// assert_eq!(trim_prefix("a/b/c.txt", "a/b").unwrap(), "/c.txt");
/// ```
pub fn trim_prefix<'a>(path: &'a str, prefix: &str) -> Result<&'a str, XmoveError> {
    if path.len() < prefix.len() || !path.starts_with(prefix) {
        return Err(XmoveError::PathMismatch {
            path: path.to_string(),
            prefix: prefix.to_string(),
        });
    }
    Ok(&path[prefix.len()..])
}

/// Strips trailing slashes unless the path is exactly the root `"/"`.
pub fn strip_trailing_slashes(path: &str) -> &str {
    if path == "/" {
        return path;
    }
    path.trim_end_matches('/')
}

/// True when the path carries a wildcard marker.
pub fn contains_wildcard(path: &str) -> bool {
    path.contains('*')
}

/// Validates wildcard placement: at most one `*`, and only in the final
/// segment. Runs before any backend I/O so a bad pattern aborts early.
pub fn validate_glob(path: &str) -> Result<(), XmoveError> {
    let root = parent(path);
    if contains_wildcard(root) {
        return Err(XmoveError::InvalidGlob(path.to_string()));
    }
    if final_segment(path).matches('*').count() > 1 {
        return Err(XmoveError::InvalidGlob(path.to_string()));
    }
    Ok(())
}

/// Everything before the final `/`. `"/a"` has parent `"/"`, a bare
/// segment has parent `""`.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// The final path segment (the whole string when there is no `/`).
pub fn final_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Joins a relative suffix onto a base path, collapsing the root case so
/// `join("/", "x")` is `"/x"` and not `"//x"`.
pub fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return rel.to_string();
    }
    if base == "/" {
        format!("/{rel}")
    } else {
        format!("{base}/{rel}")
    }
}
