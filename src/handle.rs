//! Per-request cache handle.
//!
//! The middleware attaches a [`RenderCache`] to every request that was
//! not answered from disk. Handlers extract it and call
//! [`respond`](RenderCache::respond) to render their page; the handle
//! schedules the output for caching behind the response's back.

use std::path::Path;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::PageCache;
use crate::engine::Rendered;
use crate::store::StoreError;

const SOURCE: &str = "impronta::handle";

/// Handle for rendering and caching the current request's page.
#[derive(Clone)]
pub struct RenderCache {
    request_path: String,
    cache: PageCache,
}

impl RenderCache {
    pub(crate) fn new(request_path: String, cache: PageCache) -> Self {
        Self {
            request_path,
            cache,
        }
    }

    /// Request path this handle caches under, query string excluded.
    pub fn request_path(&self) -> &str {
        &self.request_path
    }

    /// Render `template` with `data`, schedule the output for caching,
    /// and build the response.
    ///
    /// The response never waits for the cache write: the rendered page is
    /// handed to a detached writer and sent as-is, whatever the write's
    /// fate. Render failures follow the engine's error mode: inline-mode
    /// engines answer 200 with a diagnostic body that is never cached,
    /// the rest answer 500 with the detail kept in the log.
    pub async fn respond(&self, template: impl AsRef<Path>, data: &Value) -> Response {
        let template = template.as_ref();
        match self.cache.renderer().render(template, data).await {
            Ok(Rendered::Page(html)) => {
                self.schedule_write(&html);
                Html(html).into_response()
            }
            Ok(Rendered::Diagnostic(body)) => Html(body).into_response(),
            Err(err) => {
                error!(
                    target: SOURCE,
                    path = %self.request_path,
                    template = %template.display(),
                    error = %err,
                    "failed to render page"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
            }
        }
    }

    /// Delete every cached page. See [`PageCache::clear_cache`].
    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        self.cache.clear_cache().await
    }

    /// Hand the rendered page to the detached writer, unless dev mode or
    /// the path guard vetoes it.
    fn schedule_write(&self, html: &str) {
        if self.cache.dev() {
            debug!(
                target: SOURCE,
                path = %self.request_path,
                "dev mode, skipping cache write"
            );
            return;
        }

        if let Err(err) = self.cache.store().locate(&self.request_path) {
            warn!(
                target: SOURCE,
                path = %self.request_path,
                error = %err,
                "refusing to cache a page outside the cache directory"
            );
            return;
        }

        self.cache
            .store()
            .persist_detached(self.request_path.clone(), html.to_string());
    }
}

impl<S> FromRequestParts<S> for RenderCache
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RenderCache>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "page cache middleware is not installed on this route",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheOptions;
    use crate::engine::testing::{BrokenEngine, EchoEngine};
    use crate::engine::{EngineKind, EngineRegistry, RenderErrorMode};
    use axum::http::header::CONTENT_TYPE;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cache_with(
        dir: &TempDir,
        dev: bool,
        engine: Arc<dyn crate::engine::TemplateEngine>,
    ) -> PageCache {
        let mut registry = EngineRegistry::new();
        registry.register(EngineKind::Tera, engine);
        PageCache::configure_with(
            CacheOptions {
                cache_dir: dir.path().join("pages"),
                clear_on_start: false,
                dev,
                ..CacheOptions::default()
            },
            &registry,
        )
        .unwrap()
    }

    fn write_template(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let template = dir.path().join("page.html");
        std::fs::write(&template, body).unwrap();
        template
    }

    async fn wait_for_file(path: &Path) {
        for _ in 0..100 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cache file {} never appeared", path.display());
    }

    #[tokio::test]
    async fn respond_returns_html_and_persists_behind_the_response() {
        let dir = TempDir::new().unwrap();
        let template = write_template(&dir, "<h1>hello</h1>");
        let cache = cache_with(
            &dir,
            false,
            Arc::new(EchoEngine {
                mode: RenderErrorMode::Fail,
            }),
        );
        let handle = RenderCache::new("/greet".to_string(), cache);
        assert_eq!(handle.request_path(), "/greet");

        let response = handle.respond(&template, &serde_json::json!({})).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );

        let cached = dir.path().join("pages/greet/index.html");
        wait_for_file(&cached).await;
        assert_eq!(std::fs::read_to_string(cached).unwrap(), "<h1>hello</h1>");
    }

    #[tokio::test]
    async fn dev_mode_responds_without_writing() {
        let dir = TempDir::new().unwrap();
        let template = write_template(&dir, "<h1>dev</h1>");
        let cache = cache_with(
            &dir,
            true,
            Arc::new(EchoEngine {
                mode: RenderErrorMode::Fail,
            }),
        );
        let handle = RenderCache::new("/draft".to_string(), cache);

        let response = handle.respond(&template, &serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!dir.path().join("pages/draft/index.html").exists());
    }

    #[tokio::test]
    async fn render_failures_answer_500_in_fail_mode() {
        let dir = TempDir::new().unwrap();
        let template = write_template(&dir, "whatever");
        let cache = cache_with(
            &dir,
            false,
            Arc::new(BrokenEngine {
                mode: RenderErrorMode::Fail,
            }),
        );
        let handle = RenderCache::new("/boom".to_string(), cache);

        let response = handle.respond(&template, &serde_json::json!({})).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!dir.path().join("pages/boom/index.html").exists());
    }

    #[tokio::test]
    async fn diagnostics_answer_200_and_are_never_cached() {
        let dir = TempDir::new().unwrap();
        let template = write_template(&dir, "whatever");
        let cache = cache_with(
            &dir,
            false,
            Arc::new(BrokenEngine {
                mode: RenderErrorMode::Inline,
            }),
        );
        let handle = RenderCache::new("/inline".to_string(), cache);

        let response = handle.respond(&template, &serde_json::json!({})).await;

        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!dir.path().join("pages/inline/index.html").exists());
    }

    #[tokio::test]
    async fn hostile_paths_render_but_are_never_cached() {
        let dir = TempDir::new().unwrap();
        let template = write_template(&dir, "<h1>escape</h1>");
        let cache = cache_with(
            &dir,
            false,
            Arc::new(EchoEngine {
                mode: RenderErrorMode::Fail,
            }),
        );
        let handle = RenderCache::new("/../escape".to_string(), cache);

        let response = handle.respond(&template, &serde_json::json!({})).await;

        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!dir.path().join("escape/index.html").exists());
        assert!(!dir.path().join("escape").exists());
    }
}
