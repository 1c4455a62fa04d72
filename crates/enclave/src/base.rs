//! # Shared Base Namespace
//!
//! The version-independent platform layer. Assets registered here are not
//! under version control and are visible to every isolation context as a
//! resolution fallback; the WASI host interfaces it installs into linkers
//! are the platform surface every generation runs against.

use depot::LoadedAsset;
use wasmtime::component::Linker;

use crate::instance::EnclaveCtx;

#[derive(Debug)]
pub enum Error {
    Linker(wasmtime::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linker(e) => write!(f, "Linker error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<wasmtime::Error> for Error {
    fn from(e: wasmtime::Error) -> Self {
        Self::Linker(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Version-independent assets shared by every isolation context.
///
/// The namespace holds raw assets, never compiled artifacts: each context
/// materializes what it resolves inside its own engine, so delegation never
/// leaks instances across generations.
pub struct BaseNamespace {
    assets: Vec<LoadedAsset>,
}

impl BaseNamespace {
    pub fn new() -> Self {
        Self { assets: Vec::new() }
    }

    pub fn with_assets(assets: Vec<LoadedAsset>) -> Self {
        Self { assets }
    }

    pub fn register(&mut self, asset: LoadedAsset) {
        self.assets.push(asset);
    }

    pub fn get(&self, name: &str) -> Option<&LoadedAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Installs the platform (WASI) interfaces into a linker.
    pub fn link_platform(&self, linker: &mut Linker<EnclaveCtx>) -> Result<()> {
        wasmtime_wasi::p2::add_to_linker_async(linker)?;
        Ok(())
    }
}

impl Default for BaseNamespace {
    fn default() -> Self {
        Self::new()
    }
}
