//! Cache instance and lifecycle.
//!
//! [`PageCache`] owns the validated configuration, the resolved template
//! engine, the page store, and the startup gate. Clones share one
//! instance; independently configured instances share nothing, so one
//! process can run several caches against different directories.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::config::{CacheOptions, Config, ConfigError};
use crate::engine::{EngineRegistry, Renderer};
use crate::gate::{GateRelease, GateState, StartupGate};
use crate::store::{PageStore, StoreError};
use crate::telemetry::METRIC_CLEAR_TOTAL;

const SOURCE: &str = "impronta::cache";

/// A configured page cache.
///
/// Cheap to clone: hand one clone to the middleware layer and keep
/// another for host-side orchestration (on-demand clears, gate
/// inspection).
#[derive(Clone)]
pub struct PageCache {
    shared: Arc<Shared>,
}

struct Shared {
    config: Config,
    store: PageStore,
    renderer: Renderer,
    gate: StartupGate,
}

impl PageCache {
    /// Validate options and assemble a cache instance.
    ///
    /// The template engine is resolved here, once: an unknown or
    /// unavailable engine fails configuration instead of failing every
    /// request. When `clear_on_start` is set the startup clear is spawned
    /// onto the current tokio runtime, so this must be called within one.
    pub fn configure(options: CacheOptions) -> Result<Self, ConfigError> {
        Self::configure_with(options, &EngineRegistry::builtin())
    }

    /// Like [`configure`](Self::configure), but resolving the engine
    /// against a caller-assembled registry.
    pub fn configure_with(
        options: CacheOptions,
        registry: &EngineRegistry,
    ) -> Result<Self, ConfigError> {
        let config = options.validate()?;

        let resolved = registry
            .resolve(config.engine)
            .ok_or(ConfigError::EngineUnavailable {
                engine: config.engine,
            })?;
        if resolved.substituted() {
            warn!(
                target: SOURCE,
                requested = %resolved.requested,
                substitute = %resolved.kind,
                "configured view engine is not available, substituting its family sibling"
            );
        }
        let renderer = Renderer::new(&resolved);

        let store = PageStore::new(config.cache_dir.clone());
        let gate = if config.clear_on_start {
            let (gate, release) = StartupGate::pending();
            spawn_startup_clear(store.clone(), release, config.verbose);
            gate
        } else {
            StartupGate::open()
        };

        if config.verbose {
            info!(
                target: SOURCE,
                dir = %config.cache_dir.display(),
                engine = %renderer.kind(),
                "page cache configured"
            );
        } else {
            debug!(
                target: SOURCE,
                dir = %config.cache_dir.display(),
                engine = %renderer.kind(),
                "page cache configured"
            );
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                store,
                renderer,
                gate,
            }),
        })
    }

    /// Delete every cached page.
    ///
    /// Requests racing the clear simply re-render and re-persist; there is
    /// no cross-request locking.
    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        if self.shared.config.verbose {
            info!(
                target: SOURCE,
                dir = %self.shared.store.root().display(),
                "clearing page cache"
            );
        } else {
            debug!(
                target: SOURCE,
                dir = %self.shared.store.root().display(),
                "clearing page cache"
            );
        }

        self.shared.store.clear().await?;
        counter!(METRIC_CLEAR_TOTAL).increment(1);
        Ok(())
    }

    /// Startup gate state. `Failed` means the startup clear did not
    /// finish; the cache keeps serving regardless.
    pub fn gate_state(&self) -> GateState {
        self.shared.gate.state()
    }

    /// Root directory cached pages persist under.
    pub fn cache_dir(&self) -> &Path {
        self.shared.store.root()
    }

    pub(crate) fn store(&self) -> &PageStore {
        &self.shared.store
    }

    pub(crate) fn renderer(&self) -> &Renderer {
        &self.shared.renderer
    }

    pub(crate) fn gate(&self) -> &StartupGate {
        &self.shared.gate
    }

    pub(crate) fn dev(&self) -> bool {
        self.shared.config.dev
    }
}

impl fmt::Debug for PageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCache")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Run the startup clear as a detached task and release the gate with the
/// outcome.
fn spawn_startup_clear(store: PageStore, release: GateRelease, verbose: bool) {
    tokio::spawn(async move {
        match store.clear().await {
            Ok(()) => {
                counter!(METRIC_CLEAR_TOTAL).increment(1);
                if verbose {
                    info!(
                        target: SOURCE,
                        dir = %store.root().display(),
                        "cleared page cache after startup"
                    );
                } else {
                    debug!(
                        target: SOURCE,
                        dir = %store.root().display(),
                        "cleared page cache after startup"
                    );
                }
                release.ready();
            }
            Err(err) => {
                error!(
                    target: SOURCE,
                    dir = %store.root().display(),
                    error = %err,
                    "startup cache clear failed"
                );
                release.failed();
            }
        }
    });
}
