//! Page cache middleware.
//!
//! Serves cached pages straight from disk and attaches the per-request
//! handle for everything else.

use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use crate::cache::PageCache;
use crate::handle::RenderCache;
use crate::store::StoreError;
use crate::telemetry::{METRIC_HIT_TOTAL, METRIC_MISS_TOTAL};

const SOURCE: &str = "impronta::middleware";

/// Middleware that serves cached pages and arms the render handle.
///
/// Install with [`axum::middleware::from_fn_with_state`]:
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .layer(middleware::from_fn_with_state(cache.clone(), page_cache_layer));
/// ```
///
/// Every request first waits for the startup gate, so nothing is read
/// from or written to the cache directory while the startup clear runs.
/// GET requests with a persisted page are answered from disk without
/// running the handler; everything else runs the handler with a
/// [`RenderCache`] attached to the request extensions.
pub async fn page_cache_layer(
    State(cache): State<PageCache>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    cache.gate().released().await;

    let path = request.uri().path().to_string();

    if request.method() == Method::GET {
        match cache.store().read(&path).await {
            Ok(bytes) => {
                counter!(METRIC_HIT_TOTAL).increment(1);
                debug!(target: SOURCE, path = %path, outcome = "hit", "serving cached page");
                return build_page_response(bytes);
            }
            Err(StoreError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    target: SOURCE,
                    path = %path,
                    outcome = "miss",
                    "no cached page, running handler"
                );
            }
            Err(StoreError::Path(_)) => {
                debug!(
                    target: SOURCE,
                    path = %path,
                    outcome = "miss",
                    "request path is not cacheable"
                );
            }
            Err(err) => {
                warn!(
                    target: SOURCE,
                    path = %path,
                    error = %err,
                    "failed to read cached page, running handler"
                );
            }
        }
        counter!(METRIC_MISS_TOTAL).increment(1);
    }

    request
        .extensions_mut()
        .insert(RenderCache::new(path, cache));
    next.run(request).await
}

/// Build the response for a cache hit.
///
/// The `Content-Type` matches what `axum::response::Html` sent when the
/// page was first rendered, so a path answers with identical headers
/// whether it comes from the handler or from disk. `Cache-Control:
/// public, max-age=0` asks clients to revalidate, which is what a
/// framework static handler sends for mutable files.
fn build_page_response(bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length as u64));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=0"));

    response
}
