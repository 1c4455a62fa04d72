//! # Compiler Contract
//!
//! The opaque component backend behind the proxy. The backend exposes a
//! single fixed operation, `invoke`: every call kind (compile, output,
//! completion) travels through it as a tagged payload. The wasm-backed
//! implementation adapts a component's exported `invoke: string -> string`
//! function; a loader builds it from an isolation context.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use wasmtime::component::Val;

use enclave::BaseNamespace;
use enclave::InstanceHandle;
use enclave::IsolationContext;
use enclave::ResolvedUnit;
use enclave::instance;
use relay::envelope::ModelInfo;

/// Payload shapes crossing the fixed contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all_fields = "camelCase")]
pub enum BackendRequest {
    Compile {
        inputs: Vec<ModelInfo>,
    },
    Output {
        inputs: Vec<ModelInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        output_type: String,
    },
    Complete {
        uri: String,
        line: u32,
        column: u32,
        text: String,
    },
}

/// Failure raised by the backend during `invoke`.
///
/// Never escapes the proxy boundary; the proxy folds it into a
/// failure-shaped result.
#[derive(Debug, Clone)]
pub struct InvokeError(pub String);

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InvokeError {}

/// The component backend's fixed contract.
#[async_trait::async_trait]
pub trait Compiler: Send + Sync {
    async fn invoke(
        &self,
        request: BackendRequest,
    ) -> std::result::Result<serde_json::Value, InvokeError>;
}

#[derive(Debug)]
pub enum LoadError {
    /// The entry name did not resolve; the context's failure slot has the
    /// underlying cause.
    Unresolved(String),
    /// The entry resolved to a data unit instead of a component.
    NotAComponent(String),
    Instance(instance::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved(name) => write!(f, "entry '{}' did not resolve", name),
            Self::NotAComponent(name) => write!(f, "entry '{}' is not a component", name),
            Self::Instance(e) => write!(f, "Instance error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<instance::Error> for LoadError {
    fn from(e: instance::Error) -> Self {
        Self::Instance(e)
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Builds a compiler handle from a freshly constructed isolation context.
///
/// The seam between the proxy and the backend: production wires the wasm
/// loader, tests wire mocks.
#[async_trait::async_trait]
pub trait CompilerLoader: Send + Sync + 'static {
    async fn load(&self, context: &IsolationContext) -> Result<Box<dyn Compiler>>;
}

/// A compiler backed by an instantiated component.
pub struct WasmCompiler {
    component: wasmtime::component::Component,
    handle: InstanceHandle,
}

#[async_trait::async_trait]
impl Compiler for WasmCompiler {
    async fn invoke(&self, request: BackendRequest) -> std::result::Result<serde_json::Value, InvokeError> {
        let payload =
            serde_json::to_string(&request).map_err(|e| InvokeError(e.to_string()))?;

        let args = [Val::String(payload)];
        let mut results = [Val::String(String::new())];
        self.handle
            .call_func(&self.component, "invoke", &args, &mut results)
            .await
            .map_err(|e| InvokeError(e.to_string()))?;

        match &results[0] {
            Val::String(reply) => {
                serde_json::from_str(reply).map_err(|e| InvokeError(e.to_string()))
            }
            other => Err(InvokeError(format!(
                "invoke returned a non-string value: {:?}",
                other
            ))),
        }
    }
}

/// Loads the configured entry component and adapts its `invoke` export.
pub struct WasmCompilerLoader {
    entry: String,
    base: Arc<BaseNamespace>,
}

impl WasmCompilerLoader {
    pub fn new(entry: impl Into<String>, base: Arc<BaseNamespace>) -> Self {
        Self { entry: entry.into(), base }
    }
}

#[async_trait::async_trait]
impl CompilerLoader for WasmCompilerLoader {
    async fn load(&self, context: &IsolationContext) -> Result<Box<dyn Compiler>> {
        let unit = context
            .resolve(&self.entry)
            .ok_or_else(|| LoadError::Unresolved(self.entry.clone()))?;

        let ResolvedUnit::Component(component) = unit.as_ref() else {
            return Err(LoadError::NotAComponent(self.entry.clone()));
        };

        let handle = InstanceHandle::instantiate(context, &self.base, component).await?;

        Ok(Box::new(WasmCompiler {
            component: component.clone(),
            handle,
        }))
    }
}
