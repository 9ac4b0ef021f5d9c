//! Render-once page cache middleware for axum.
//!
//! On the first request for a path, the handler renders its page through
//! a pluggable template engine; the output is persisted at
//! `<cache_dir>/<request-path>/index.html` behind the response's back,
//! and every later request for that path is answered straight from disk
//! without running the handler. There is no per-entry expiry: the cache
//! is cleared wholesale, at startup and on demand.
//!
//! # Wiring
//!
//! ```ignore
//! use axum::{Router, middleware, response::Response, routing::get};
//! use impronta::{CacheOptions, PageCache, RenderCache, page_cache_layer};
//! use serde_json::json;
//!
//! async fn home(cache: RenderCache) -> Response {
//!     cache
//!         .respond("templates/home.html", &json!({ "title": "Home" }))
//!         .await
//! }
//!
//! let cache = PageCache::configure(CacheOptions {
//!     cache_dir: "/var/cache/site/pages".into(),
//!     ..CacheOptions::default()
//! })?;
//!
//! let app: Router = Router::new()
//!     .route("/", get(home))
//!     .layer(middleware::from_fn_with_state(cache.clone(), page_cache_layer));
//! ```
//!
//! # Configuration
//!
//! [`CacheOptions`] deserializes with serde, so hosts can embed it in
//! their own configuration file:
//!
//! ```toml
//! [page_cache]
//! cache_dir = "/var/cache/site/pages"
//! clear_on_start = true
//! view_engine = "tera"
//! ```
//!
//! The cache directory is cleared once at startup unless `clear_on_start`
//! is off; requests wait behind a [`GateState`] gate until that clear
//! resolves. Full clears are available at runtime through
//! [`PageCache::clear_cache`] and [`RenderCache::clear_cache`].
//!
//! # Engines
//!
//! Adapters for tera, minijinja, and handlebars sit behind cargo features
//! (`tera` and `handlebars` are on by default). Tera and minijinja share
//! the Jinja template family: configuring the one that is not compiled in
//! substitutes the other with a logged warning. The handlebars adapter
//! reports render failures inline in the page body instead of failing the
//! request; inline diagnostics are never cached.

pub mod cache;
pub mod config;
pub mod engine;
pub mod gate;
pub mod handle;
pub mod middleware;
pub mod path;
pub mod store;
pub mod telemetry;

pub use cache::PageCache;
pub use config::{CacheOptions, ConfigError};
pub use engine::{
    CompiledTemplate, EngineError, EngineKind, EngineRegistry, RenderError, RenderErrorMode,
    ResolvedEngine, TemplateEngine,
};
pub use gate::GateState;
pub use handle::RenderCache;
pub use middleware::page_cache_layer;
pub use path::{INDEX_FILE, PathError};
pub use store::StoreError;
pub use telemetry::describe_metrics;
