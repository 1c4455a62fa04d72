pub mod asset;
pub mod registry;

pub use asset::AssetFormat;
pub use asset::AssetSource;
pub use asset::Generation;
pub use asset::LoadedAsset;
pub use asset::Snapshot;
pub use asset::SourceError;
pub use asset::StaticSource;
pub use registry::Registry;

#[cfg(test)]
mod tests;
