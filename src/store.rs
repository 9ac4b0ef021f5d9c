//! Page store.
//!
//! Filesystem backend for cached pages: reads entries for the hit path,
//! persists rendered output, and clears the whole cache directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error};

use crate::path::{self, PathError};
use crate::telemetry::{METRIC_WRITE_ERROR_TOTAL, METRIC_WRITE_TOTAL};

const SOURCE: &str = "impronta::store";

/// Errors raised by the page store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request path cannot be mapped onto the cache directory.
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Filesystem-backed store rooted at the configured cache directory.
///
/// The root is created lazily on the first write, so a startup clear never
/// races the store's own setup.
#[derive(Debug, Clone)]
pub(crate) struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory of the store.
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Cache file a request path maps to.
    pub(crate) fn locate(&self, request_path: &str) -> Result<PathBuf, PathError> {
        path::page_path(&self.root, request_path)
    }

    /// Read the cached page for a request path.
    pub(crate) async fn read(&self, request_path: &str) -> Result<Bytes, StoreError> {
        let file = self.locate(request_path)?;
        let data = fs::read(file).await?;
        Ok(Bytes::from(data))
    }

    /// Persist rendered output for a request path, creating parent
    /// directories as needed.
    ///
    /// Whole-file truncating write. Concurrent writers for the same path
    /// render the same content, so the last writer winning is benign.
    pub(crate) async fn persist(
        &self,
        request_path: &str,
        content: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let file = self.locate(request_path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file, content).await?;
        Ok(file)
    }

    /// Persist without making the caller wait.
    ///
    /// The write runs as a detached task: the response that triggered it is
    /// sent regardless of the outcome, and failures surface only in the log
    /// and the write-error counter.
    pub(crate) fn persist_detached(&self, request_path: String, content: String) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.persist(&request_path, content.as_bytes()).await {
                Ok(file) => {
                    counter!(METRIC_WRITE_TOTAL).increment(1);
                    debug!(
                        target: SOURCE,
                        path = %request_path,
                        file = %file.display(),
                        "cached rendered page"
                    );
                }
                Err(err) => {
                    counter!(METRIC_WRITE_ERROR_TOTAL).increment(1);
                    error!(
                        target: SOURCE,
                        path = %request_path,
                        error = %err,
                        "failed to cache rendered page"
                    );
                }
            }
        });
    }

    /// Delete the entire cache directory.
    ///
    /// A directory that does not exist is treated as success, which makes
    /// clears idempotent and lets the first startup run on a fresh machine
    /// complete cleanly.
    pub(crate) async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn persist_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().join("pages"));

        let file = store.persist("/blog/post-1", b"<h1>hi</h1>").await.unwrap();

        assert_eq!(file, dir.path().join("pages/blog/post-1/index.html"));
        assert_eq!(
            store.read("/blog/post-1").await.unwrap().as_ref(),
            b"<h1>hi</h1>"
        );
    }

    #[tokio::test]
    async fn persist_overwrites_existing_entries() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().to_path_buf());

        store.persist("/page", b"first").await.unwrap();
        store.persist("/page", b"second").await.unwrap();

        assert_eq!(store.read("/page").await.unwrap().as_ref(), b"second");
    }

    #[tokio::test]
    async fn read_of_uncached_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().to_path_buf());

        match store.read("/missing").await {
            Err(StoreError::Io(err)) => assert_eq!(err.kind(), ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clear_removes_every_entry() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().join("pages"));
        store.persist("/", b"home").await.unwrap();
        store.persist("/about", b"about").await.unwrap();

        store.clear().await.unwrap();

        assert!(!dir.path().join("pages").exists());
        assert!(store.read("/about").await.is_err());
    }

    #[tokio::test]
    async fn clear_of_missing_directory_succeeds() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().join("never-created"));

        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn persist_reports_io_errors_when_the_root_is_blocked() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("pages");
        std::fs::write(&root, "occupied").unwrap();
        let store = PageStore::new(root.clone());

        match store.persist("/page", b"html").await {
            Err(StoreError::Io(_)) => {}
            other => panic!("expected an io error, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&root).unwrap(), "occupied");
    }

    #[tokio::test]
    async fn clear_reports_io_errors_when_the_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("pages");
        std::fs::write(&root, "occupied").unwrap();
        let store = PageStore::new(root);

        assert!(matches!(store.clear().await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn traversal_attempts_never_touch_disk() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::new(dir.path().join("pages"));

        assert!(store.persist("/../outside", b"x").await.is_err());

        assert!(!dir.path().join("outside").exists());
        assert!(!dir.path().join("pages").exists());
    }
}
