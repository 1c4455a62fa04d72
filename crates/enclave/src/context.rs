//! # Isolation Context
//!
//! A per-generation resolution namespace. Each context owns a fresh wasmtime
//! engine and its own name-to-unit cache, so nothing compiled for one
//! generation can alias anything compiled for another. The entire context is
//! discarded wholesale when the generation advances; it is never patched in
//! place.
//!
//! ## Failure protocol
//!
//! Resolution failures are recorded, not raised. The first failure a context
//! encounters is stored in its failure slot and `resolve` reports absence to
//! the caller. Callers performing work through a context must poll
//! `last_failure` after each unit of work and discard the context when the
//! slot is set, even if the work itself appeared to return a value;
//! otherwise a swallowed load failure corrupts results without signaling.

use std::sync::Arc;
use std::sync::OnceLock;

use dashmap::DashMap;
use tracing::trace;
use wasmtime::Engine;
use wasmtime::component::Component;

use depot::AssetFormat;
use depot::Generation;
use depot::LoadedAsset;
use depot::Snapshot;

use crate::base::BaseNamespace;

#[derive(Debug)]
pub enum Error {
    Engine(wasmtime::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "Engine error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// The first resolution failure a context encountered.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub name: String,
    pub error: String,
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to load '{}': {}", self.name, self.error)
    }
}

/// A materialized asset, cached by the context that resolved it.
pub enum ResolvedUnit {
    /// A component compiled inside this context's engine.
    Component(Component),
    /// Opaque bytes, shared with the snapshot that delivered them.
    Data(Arc<Vec<u8>>),
}

/// Per-generation resolver with an isolated namespace.
pub struct IsolationContext {
    generation: Generation,
    engine: Engine,
    snapshot: Snapshot,
    base: Arc<BaseNamespace>,
    cache: DashMap<String, Arc<ResolvedUnit>>,
    last_failure: OnceLock<LoadFailure>,
}

impl IsolationContext {
    /// Builds a context for the snapshot's generation.
    ///
    /// The engine is private to this context: engines never share compiled
    /// artifacts, so identical bytes resolved by two contexts can never be
    /// identity-equal.
    pub fn new(snapshot: Snapshot, base: Arc<BaseNamespace>) -> Result<Self> {
        let mut config = wasmtime::Config::new();
        config.async_support(true);
        config.wasm_component_model(true);

        let engine = Engine::new(&config).map_err(Error::Engine)?;

        Ok(Self {
            generation: snapshot.generation(),
            engine,
            snapshot,
            base,
            cache: DashMap::new(),
            last_failure: OnceLock::new(),
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Resolves a name to a cached unit.
    ///
    /// Cache hit wins; otherwise the snapshot is consulted, then the shared
    /// base namespace. The materialized unit (including a base-delegated
    /// one) is cached in this context. `None` means the failure slot was
    /// set; see the module docs for the polling contract.
    pub fn resolve(&self, name: &str) -> Option<Arc<ResolvedUnit>> {
        if let Some(unit) = self.cache.get(name) {
            return Some(unit.value().clone());
        }

        let asset = self
            .snapshot
            .get(name)
            .or_else(|| self.base.get(name))
            .cloned();

        let Some(asset) = asset else {
            self.record_failure(name, "not present in snapshot or base namespace");
            return None;
        };

        let unit = match self.materialize(&asset) {
            Ok(unit) => Arc::new(unit),
            Err(error) => {
                self.record_failure(name, &error);
                return None;
            }
        };

        trace!(name = %name, generation = %self.generation, "resolved unit");

        // A racing resolve of the same name keeps one winner.
        let cached = self
            .cache
            .entry(name.to_string())
            .or_insert(unit)
            .value()
            .clone();
        Some(cached)
    }

    /// The first failure this context recorded, if any. Presence is fatal
    /// for the context: discard it, do not reuse it for a later call.
    pub fn last_failure(&self) -> Option<LoadFailure> {
        self.last_failure.get().cloned()
    }

    fn materialize(&self, asset: &LoadedAsset) -> std::result::Result<ResolvedUnit, String> {
        match asset.format {
            AssetFormat::Component => Component::new(&self.engine, asset.bytes.as_slice())
                .map(ResolvedUnit::Component)
                .map_err(|e| e.to_string()),
            AssetFormat::Data => Ok(ResolvedUnit::Data(Arc::clone(&asset.bytes))),
        }
    }

    fn record_failure(&self, name: &str, error: &str) {
        // First failure wins; later ones are dropped.
        let _ = self.last_failure.set(LoadFailure {
            name: name.to_string(),
            error: error.to_string(),
        });
    }
}
