//! Template engines.
//!
//! The cache renders pages through a small capability trait pair: an
//! engine compiles template source into a program, the program renders
//! with request data. Adapters for tera, minijinja, and handlebars sit
//! behind cargo features; the registry resolves a configured name to
//! whichever adapter is compiled in, substituting within a template
//! family when the requested engine is missing.

use std::collections::HashMap;
use std::fmt::{self, Write as FmtWrite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

use crate::telemetry::METRIC_RENDER_MS;

#[cfg(feature = "handlebars")]
pub mod handlebars;
#[cfg(feature = "minijinja")]
pub mod minijinja;
#[cfg(feature = "tera")]
pub mod tera;

#[cfg(feature = "handlebars")]
pub use self::handlebars::HandlebarsEngine;
#[cfg(feature = "minijinja")]
pub use self::minijinja::MinijinjaEngine;
#[cfg(feature = "tera")]
pub use self::tera::TeraEngine;

const SOURCE: &str = "impronta::engine";

/// Template engine families the cache can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Tera templates (Jinja-family syntax).
    Tera,
    /// MiniJinja templates (same family as Tera).
    Minijinja,
    /// Handlebars templates.
    Handlebars,
}

impl EngineKind {
    /// Canonical configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Tera => "tera",
            EngineKind::Minijinja => "minijinja",
            EngineKind::Handlebars => "handlebars",
        }
    }

    /// Parse a configured engine name. Matching is case-insensitive.
    pub fn parse(name: &str) -> Option<EngineKind> {
        match name.to_ascii_lowercase().as_str() {
            "tera" => Some(EngineKind::Tera),
            "minijinja" => Some(EngineKind::Minijinja),
            "handlebars" => Some(EngineKind::Handlebars),
            _ => None,
        }
    }

    /// Engine that substitutes for this one when it is not compiled in.
    ///
    /// Tera and MiniJinja share the Jinja template family, so either can
    /// stand in for the other. Handlebars has no substitute.
    pub fn fallback(self) -> Option<EngineKind> {
        match self {
            EngineKind::Tera => Some(EngineKind::Minijinja),
            EngineKind::Minijinja => Some(EngineKind::Tera),
            EngineKind::Handlebars => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an engine's render failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderErrorMode {
    /// Failures propagate and the request answers with a server error.
    Fail,
    /// Failures become the page body: the request answers 200 with a
    /// diagnostic, which is never cached.
    Inline,
}

/// Errors produced by a template engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The template source failed to compile.
    #[error("template `{name}` failed to compile: {message}")]
    Compile { name: String, message: String },
    /// The compiled template failed to render.
    #[error("template `{name}` failed to render: {message}")]
    Render { name: String, message: String },
}

impl EngineError {
    /// Compile failure carrying the engine error's full cause chain.
    pub fn compile(name: impl Into<String>, err: impl std::error::Error) -> Self {
        Self::Compile {
            name: name.into(),
            message: chain_message(&err),
        }
    }

    /// Render failure carrying the engine error's full cause chain.
    pub fn render(name: impl Into<String>, err: impl std::error::Error) -> Self {
        Self::Render {
            name: name.into(),
            message: chain_message(&err),
        }
    }
}

/// Flatten an error and its sources into one line.
///
/// Engine crates tend to put the useful detail in the cause chain while
/// the top-level message only names the template.
fn chain_message(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(message, ": {cause}");
        source = cause.source();
    }
    message
}

/// A template engine the cache can render pages through.
///
/// Engines stay free of I/O: the cache reads template source from disk
/// and hands it over as a string.
pub trait TemplateEngine: Send + Sync {
    /// Canonical name, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// How this engine's render failures are reported.
    fn error_mode(&self) -> RenderErrorMode {
        RenderErrorMode::Fail
    }

    /// Compile template source into a renderable program.
    fn compile(
        &self,
        name: &str,
        source: String,
    ) -> Result<Box<dyn CompiledTemplate>, EngineError>;
}

/// A compiled template ready to render with request data.
pub trait CompiledTemplate: Send + Sync {
    /// Render with the provided data.
    fn render(&self, data: &Value) -> Result<String, EngineError>;
}

impl fmt::Debug for dyn CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledTemplate")
    }
}

/// Registry of available engine adapters.
///
/// [`builtin`](EngineRegistry::builtin) registers every adapter compiled
/// into the crate; tests and embedders can assemble their own subsets and
/// hand them to `PageCache::configure_with`.
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: HashMap<EngineKind, Arc<dyn TemplateEngine>>,
}

impl EngineRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every adapter compiled into the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "tera")]
        registry.register(EngineKind::Tera, Arc::new(TeraEngine::new()));
        #[cfg(feature = "minijinja")]
        registry.register(EngineKind::Minijinja, Arc::new(MinijinjaEngine::new()));
        #[cfg(feature = "handlebars")]
        registry.register(EngineKind::Handlebars, Arc::new(HandlebarsEngine::new()));
        registry
    }

    /// Register an adapter for an engine kind, replacing any previous one.
    pub fn register(&mut self, kind: EngineKind, engine: Arc<dyn TemplateEngine>) {
        self.engines.insert(kind, engine);
    }

    /// Adapter registered for the given kind, if any.
    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn TemplateEngine>> {
        self.engines.get(&kind).cloned()
    }

    /// Resolve the engine that answers for a configured kind.
    ///
    /// A missing engine falls back along [`EngineKind::fallback`]. The
    /// resolution records which engine actually answers so a substitution
    /// can be logged once, at configuration time.
    pub fn resolve(&self, requested: EngineKind) -> Option<ResolvedEngine> {
        if let Some(engine) = self.get(requested) {
            return Some(ResolvedEngine {
                requested,
                kind: requested,
                engine,
            });
        }

        let fallback = requested.fallback()?;
        let engine = self.get(fallback)?;
        Some(ResolvedEngine {
            requested,
            kind: fallback,
            engine,
        })
    }
}

/// Outcome of resolving a configured engine against the registry.
#[derive(Clone)]
pub struct ResolvedEngine {
    /// Engine the configuration asked for.
    pub requested: EngineKind,
    /// Engine that will answer.
    pub kind: EngineKind,
    /// The adapter itself.
    pub engine: Arc<dyn TemplateEngine>,
}

impl ResolvedEngine {
    /// True when the registry substituted a family sibling.
    pub fn substituted(&self) -> bool {
        self.kind != self.requested
    }
}

/// Errors raised on the render path.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("failed to read template `{path}`")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rendered {
    /// Fully rendered page, eligible for caching.
    Page(String),
    /// Diagnostic body produced by an inline-mode engine after a failure.
    /// Served, never cached.
    Diagnostic(String),
}

/// Renders template files through the resolved engine.
#[derive(Clone)]
pub(crate) struct Renderer {
    kind: EngineKind,
    mode: RenderErrorMode,
    engine: Arc<dyn TemplateEngine>,
}

impl Renderer {
    pub(crate) fn new(resolved: &ResolvedEngine) -> Self {
        Self {
            kind: resolved.kind,
            mode: resolved.engine.error_mode(),
            engine: Arc::clone(&resolved.engine),
        }
    }

    pub(crate) fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Render a template file with the given data.
    ///
    /// The template is read fresh on every render. Only uncached pages
    /// reach this point, so each template is typically rendered once per
    /// clear.
    pub(crate) async fn render(
        &self,
        template: &Path,
        data: &Value,
    ) -> Result<Rendered, RenderError> {
        let name = template.display().to_string();

        let source = match fs::read_to_string(template).await {
            Ok(source) => source,
            Err(err) => {
                return self.absorb(RenderError::TemplateRead {
                    path: template.to_path_buf(),
                    source: err,
                });
            }
        };

        let started_at = Instant::now();
        let outcome = self
            .engine
            .compile(&name, source)
            .and_then(|compiled| compiled.render(data))
            .map(Rendered::Page);
        histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(page) => Ok(page),
            Err(err) => self.absorb(err.into()),
        }
    }

    /// Apply the engine's error mode to a render-path failure.
    fn absorb(&self, err: RenderError) -> Result<Rendered, RenderError> {
        match self.mode {
            RenderErrorMode::Fail => Err(err),
            RenderErrorMode::Inline => {
                warn!(
                    target: SOURCE,
                    engine = %self.kind,
                    error = %err,
                    "render failed, answering with an inline diagnostic"
                );
                Ok(Rendered::Diagnostic(format!(
                    "{} render error: {err}",
                    self.kind
                )))
            }
        }
    }
}
