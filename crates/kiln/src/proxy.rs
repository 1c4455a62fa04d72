//! # Compiler Proxy
//!
//! Builds and caches the current loaded toolchain instance for a
//! generation, rebuilding when the registry's generation advances. The
//! rebuild is optimistic: capture the generation, build, then re-check.
//! An instance built against a superseded generation is discarded and the
//! build retried against the now-current one, never committed.
//!
//! The proxy's public contract never raises; every failure is folded into
//! a failure-shaped outcome.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use depot::Generation;
use depot::Registry;
use enclave::BaseNamespace;
use enclave::IsolationContext;
use enclave::context;

use crate::backend;
use crate::backend::BackendRequest;
use crate::backend::Compiler;
use crate::backend::CompilerLoader;

/// Rebuild attempts before giving up on a churning registry.
const BUILD_ATTEMPTS: usize = 3;

/// What an invocation produced: the typed result, or a failure shaped
/// like one.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(serde_json::Value),
    Failure { message: String, detail: String },
}

impl Outcome {
    pub fn failure(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

enum BuildError {
    Snapshot(depot::registry::Error),
    Context(context::Error),
    Load(backend::LoadError),
    Recorded(enclave::LoadFailure),
    Raced { attempts: usize },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(e) => write!(f, "snapshot failed: {}", e),
            Self::Context(e) => write!(f, "context construction failed: {}", e),
            Self::Load(e) => write!(f, "toolchain load failed: {}", e),
            Self::Recorded(failure) => write!(f, "toolchain load failed: {}", failure),
            Self::Raced { attempts } => write!(
                f,
                "dependency generation kept advancing across {} rebuild attempts",
                attempts
            ),
        }
    }
}

/// The instance currently answering calls, tagged with the generation it
/// was built for.
struct LoadedInstance {
    context: Arc<IsolationContext>,
    compiler: Box<dyn Compiler>,
    generation: Generation,
}

/// Serializes invocations onto one cached instance per generation.
pub struct CompilerProxy {
    registry: Arc<Registry>,
    base: Arc<BaseNamespace>,
    loader: Arc<dyn CompilerLoader>,
    current: Mutex<Option<LoadedInstance>>,
}

impl CompilerProxy {
    pub fn new(
        registry: Arc<Registry>,
        base: Arc<BaseNamespace>,
        loader: Arc<dyn CompilerLoader>,
    ) -> Self {
        Self {
            registry,
            base,
            loader,
            current: Mutex::new(None),
        }
    }

    /// Invokes the backend, rebuilding the instance first if the
    /// generation moved. Always returns an outcome, success or failure.
    pub async fn invoke(&self, request: BackendRequest) -> Outcome {
        let mut current = self.current.lock().await;

        let stale = match current.as_ref() {
            None => true,
            Some(instance) => instance.generation != self.registry.generation(),
        };

        if stale {
            match self.rebuild().await {
                Ok(instance) => {
                    debug!(generation = %instance.generation, "toolchain instance committed");
                    *current = Some(instance);
                }
                Err(error) => {
                    *current = None;
                    return Outcome::failure("toolchain rebuild failed", error.to_string());
                }
            }
        }

        let Some(instance) = current.as_ref() else {
            return Outcome::failure("no toolchain instance", "rebuild produced nothing");
        };

        let invoked = instance.compiler.invoke(request).await;

        // Poll the context's failure slot regardless of the apparent
        // result: in the sandboxed mode, a load failure may have been
        // swallowed mid-call. Presence invalidates the instance.
        if let Some(failure) = instance.context.last_failure() {
            warn!(name = %failure.name, "load failure detected; discarding instance");
            *current = None;
            return Outcome::failure(
                format!("failed to load '{}'", failure.name),
                failure.error,
            );
        }

        match invoked {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::failure("toolchain invocation failed", error.to_string()),
        }
    }

    /// Optimistic build loop: build against a captured generation, then
    /// re-check it. A racing mutation discards the fresh instance and
    /// retries; a bounded number of races fails the call rather than
    /// committing a stale instance.
    async fn rebuild(&self) -> Result<LoadedInstance, BuildError> {
        for attempt in 1..=BUILD_ATTEMPTS {
            let before = self.registry.generation();
            let snapshot = self
                .registry
                .snapshot()
                .await
                .map_err(BuildError::Snapshot)?;
            let context = IsolationContext::new(snapshot, self.base.clone())
                .map_err(BuildError::Context)?;

            let compiler = match self.loader.load(&context).await {
                Ok(compiler) => compiler,
                Err(error) => {
                    // The context may carry the underlying cause.
                    if let Some(failure) = context.last_failure() {
                        return Err(BuildError::Recorded(failure));
                    }
                    return Err(BuildError::Load(error));
                }
            };

            if self.registry.generation() == before {
                return Ok(LoadedInstance {
                    context: Arc::new(context),
                    compiler,
                    generation: before,
                });
            }

            debug!(attempt, generation = %before, "generation advanced during rebuild; discarding");
        }

        Err(BuildError::Raced { attempts: BUILD_ATTEMPTS })
    }
}
