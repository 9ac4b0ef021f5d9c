//! Cache path resolution.
//!
//! Maps request paths onto files beneath the cache root. Every page is
//! stored as `<root>/<request-path>/index.html`, so later requests for the
//! same path can be answered from disk without rendering.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// File name appended to every resolved request path.
pub const INDEX_FILE: &str = "index.html";

/// Errors raised while resolving a request path against the cache root.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The request path would resolve outside the cache root.
    #[error("request path escapes the cache directory")]
    Escapes,
}

/// Resolve the cache file for a request path.
///
/// The caller passes the path component only; `Uri::path()` never carries a
/// query string, which is how `/page?a=1` and `/page?b=2` share one cache
/// file. `/about` and `/about/` resolve identically, and `/` resolves to
/// `<root>/index.html`. No percent-decoding or case folding is applied.
///
/// Parent-directory components are rejected. Routers treat `..` as an
/// opaque segment, but the filesystem would honour it, and joining an
/// absolute path onto `root` would replace the root outright.
pub fn page_path(root: &Path, request_path: &str) -> Result<PathBuf, PathError> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return Err(PathError::Escapes);
    }

    Ok(root.join(relative).join(INDEX_FILE))
}
