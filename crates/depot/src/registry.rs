//! # Dependency Registry
//!
//! Named groups of asset sources plus the monotonic generation counter that
//! serves as the system's logical clock for "which configuration is active".
//!
//! Mutations are serialized by a single lock around the group list; the
//! counter itself is an atomic so readers never block. Snapshots clone the
//! source list under the lock and then drive the factories outside it, so a
//! snapshot may observe either side of a concurrent mutation; callers pair
//! it with the generation captured when the snapshot began.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;
use tracing::debug;

use crate::asset::AssetSource;
use crate::asset::Generation;
use crate::asset::LoadedAsset;
use crate::asset::Snapshot;
use crate::asset::SourceError;

#[derive(Debug, Clone)]
pub enum Error {
    /// A group's factory failed while producing its assets.
    Source { key: String, error: SourceError },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source { key, error } => {
                write!(f, "group '{}' failed to load: {}", key, error)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Registry of named dependency groups.
///
/// Session-scoped: created once per worker and injected into consumers,
/// never a process-wide singleton. Groups are kept in registration order
/// because snapshot flattening preserves it.
pub struct Registry {
    groups: Mutex<Vec<(String, Arc<dyn AssetSource>)>>,
    generation: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The current generation. Pair this with `snapshot` for staleness
    /// detection: read the generation immediately before snapshotting.
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    /// Installs or replaces a group, bumping the generation.
    ///
    /// Replacement keeps the group's registration slot, so the flattening
    /// order of unrelated groups is stable across version swaps.
    pub async fn set(&self, key: impl Into<String>, source: Arc<dyn AssetSource>) -> Generation {
        let key = key.into();
        let mut groups = self.groups.lock().await;
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = source,
            None => groups.push((key.clone(), source)),
        }
        let generation = Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(key = %key, generation = %generation, "dependency group set");
        generation
    }

    /// Removes a group if present. The generation is bumped only when
    /// something was actually removed.
    pub async fn remove(&self, key: &str) -> bool {
        let mut groups = self.groups.lock().await;
        let before = groups.len();
        groups.retain(|(k, _)| k != key);
        if groups.len() == before {
            return false;
        }
        let generation = Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(key = %key, generation = %generation, "dependency group removed");
        true
    }

    pub async fn is_empty(&self) -> bool {
        self.groups.lock().await.is_empty()
    }

    /// The registered keys, in registration order.
    pub async fn keys(&self) -> Vec<String> {
        self.groups.lock().await.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Materializes every group in registration order into one snapshot.
    ///
    /// The generation tag is read before the first factory runs. The lock is
    /// held only long enough to clone the source list; factory I/O happens
    /// outside it, so concurrent `set`/`remove` calls are never blocked by a
    /// slow download.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let generation = self.generation();
        let sources: Vec<(String, Arc<dyn AssetSource>)> = self.groups.lock().await.clone();

        let mut assets: Vec<LoadedAsset> = Vec::new();
        for (key, source) in sources {
            let mut loaded = source
                .load()
                .await
                .map_err(|error| Error::Source { key: key.clone(), error })?;
            assets.append(&mut loaded);
        }

        Ok(Snapshot::new(generation, assets))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
