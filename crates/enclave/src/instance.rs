//! # Instance Handle
//!
//! Thread-safe handle to an instantiated component. Wasmtime's Store is
//! !Send + !Sync, so the store/instance pair lives behind an async mutex,
//! letting the worker drive one instance from multiple tasks.

use std::sync::Arc;

use tokio::sync::Mutex;
use wasmtime::Store;
use wasmtime::component::Component;
use wasmtime::component::Instance;
use wasmtime::component::Linker;
use wasmtime::component::ResourceTable;
use wasmtime::component::Val;
use wasmtime_wasi::WasiCtx;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::WasiCtxView;
use wasmtime_wasi::WasiView;

use crate::base;
use crate::base::BaseNamespace;
use crate::context::IsolationContext;

#[derive(Debug)]
pub enum Error {
    Platform(base::Error),
    Instantiate(wasmtime::Error),
    ExportNotFound(String),
    Execution(wasmtime::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Platform(e) => write!(f, "Platform link error: {}", e),
            Self::Instantiate(e) => write!(f, "Instantiate error: {}", e),
            Self::ExportNotFound(name) => write!(f, "Export '{}' not found", name),
            Self::Execution(e) => write!(f, "Execution error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<base::Error> for Error {
    fn from(e: base::Error) -> Self {
        Self::Platform(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Store context for instances running inside an isolation context.
pub struct EnclaveCtx {
    wasi: WasiCtx,
    table: ResourceTable,
}

impl EnclaveCtx {
    pub fn new() -> Self {
        Self {
            wasi: WasiCtxBuilder::new().build(),
            table: ResourceTable::new(),
        }
    }
}

impl Default for EnclaveCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl WasiView for EnclaveCtx {
    fn ctx(&mut self) -> WasiCtxView<'_> {
        WasiCtxView {
            ctx: &mut self.wasi,
            table: &mut self.table,
        }
    }
}

/// Thread-safe handle to a running instance.
#[derive(Clone)]
pub struct InstanceHandle {
    inner: Arc<Mutex<State>>,
}

pub(crate) struct State {
    pub store: Store<EnclaveCtx>,
    pub instance: Instance,
}

impl InstanceHandle {
    pub fn new(store: Store<EnclaveCtx>, instance: Instance) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State { store, instance })),
        }
    }

    /// Instantiates a component inside its owning context's engine, with the
    /// base namespace's platform interfaces linked in.
    pub async fn instantiate(
        context: &IsolationContext,
        base: &BaseNamespace,
        component: &Component,
    ) -> Result<Self> {
        let mut linker: Linker<EnclaveCtx> = Linker::new(context.engine());
        base.link_platform(&mut linker)?;

        let mut store = Store::new(context.engine(), EnclaveCtx::new());
        let instance = linker
            .instantiate_async(&mut store, component)
            .await
            .map_err(Error::Instantiate)?;

        Ok(Self::new(store, instance))
    }

    /// Calls a top-level exported function dynamically using Vals.
    ///
    /// The component's export metadata provides the function index; the call
    /// itself runs through the shared store under the handle's lock.
    pub async fn call_func(
        &self,
        component: &Component,
        function: &str,
        args: &[Val],
        results: &mut [Val],
    ) -> Result<()> {
        let func_idx = component
            .get_export_index(None, function)
            .ok_or_else(|| Error::ExportNotFound(function.to_string()))?;

        let mut guard = self.inner.lock().await;
        let State { store, instance } = &mut *guard;

        let func = instance
            .get_func(&mut *store, &func_idx)
            .ok_or_else(|| Error::ExportNotFound(function.to_string()))?;

        func.call_async(&mut *store, args, results)
            .await
            .map_err(Error::Execution)?;

        // The store cannot service another call until post-return runs.
        func.post_return_async(&mut *store)
            .await
            .map_err(Error::Execution)?;

        Ok(())
    }
}
