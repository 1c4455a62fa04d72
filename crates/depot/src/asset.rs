//! Binary asset payloads, the sources that deliver them, and point-in-time
//! snapshots of the registered set.

use std::sync::Arc;

/// How an asset's bytes are materialized when resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssetFormat {
    /// Wasm component bytes, compiled into a component on resolve.
    Component,
    /// Opaque payload carried as-is (reference inputs, manifests).
    Data,
}

/// A named binary payload produced by an asset source.
#[derive(Clone, Debug)]
pub struct LoadedAsset {
    pub name: String,
    pub bytes: Arc<Vec<u8>>,
    pub format: AssetFormat,
}

impl LoadedAsset {
    pub fn component(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::new(bytes.into()),
            format: AssetFormat::Component,
        }
    }

    pub fn data(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::new(bytes.into()),
            format: AssetFormat::Data,
        }
    }
}

/// Failure reported by an asset source while producing its payloads.
#[derive(Debug, Clone)]
pub struct SourceError(pub String);

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SourceError {}

/// An async factory producing an ordered list of assets.
///
/// Sources perform the actual I/O (feed downloads, artifact fetches); the
/// registry holding them never does.
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<LoadedAsset>, SourceError>;
}

/// An asset source backed by a fixed in-memory list.
///
/// Used for built-in payload sets and by tests.
#[derive(Clone, Debug)]
pub struct StaticSource {
    assets: Vec<LoadedAsset>,
}

impl StaticSource {
    pub fn new(assets: Vec<LoadedAsset>) -> Self {
        Self { assets }
    }
}

#[async_trait::async_trait]
impl AssetSource for StaticSource {
    async fn load(&self) -> Result<Vec<LoadedAsset>, SourceError> {
        Ok(self.assets.clone())
    }
}

/// Logical clock for the active dependency configuration.
///
/// Strictly increases on every effective registry mutation. Consumers pair
/// a generation read with the snapshot they materialize to detect staleness.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// A materialized view of every registered group at a point in time.
///
/// Tagged with the generation observed when materialization began, so a
/// consumer can tell whether the view is still current.
#[derive(Clone, Debug)]
pub struct Snapshot {
    generation: Generation,
    assets: Vec<LoadedAsset>,
}

impl Snapshot {
    pub fn new(generation: Generation, assets: Vec<LoadedAsset>) -> Self {
        Self { generation, assets }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn assets(&self) -> &[LoadedAsset] {
        &self.assets
    }

    /// Looks up an asset by name. Later groups shadow earlier ones.
    pub fn get(&self, name: &str) -> Option<&LoadedAsset> {
        self.assets.iter().rev().find(|a| a.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }
}
