//! # Worker Session
//!
//! The background execution unit. Owns the registry, proxy, resolver
//! chain, and tracked document set for one session, and dispatches every
//! request kind the envelope defines. Torn down with the channel that
//! serves it; never a process-wide singleton.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use depot::Registry;
use enclave::BaseNamespace;
use relay::WorkerService;
use relay::envelope::ContentChange;
use relay::envelope::ModelInfo;
use relay::envelope::Request;
use relay::envelope::Response;

use crate::backend::BackendRequest;
use crate::backend::CompilerLoader;
use crate::proxy::CompilerProxy;
use crate::proxy::Outcome;
use crate::resolver;
use crate::resolver::DependencyRequest;
use crate::resolver::SpecifierResolver;
use crate::specifier;

/// Session-scoped worker state.
pub struct WorkerSession {
    registry: Arc<Registry>,
    proxy: CompilerProxy,
    resolvers: Vec<Arc<dyn SpecifierResolver>>,
    documents: Mutex<HashMap<String, ModelInfo>>,
}

impl WorkerSession {
    pub fn new(
        registry: Arc<Registry>,
        base: Arc<BaseNamespace>,
        loader: Arc<dyn CompilerLoader>,
        resolvers: Vec<Arc<dyn SpecifierResolver>>,
    ) -> Self {
        let proxy = CompilerProxy::new(registry.clone(), base, loader);
        Self {
            registry,
            proxy,
            resolvers,
            documents: Mutex::new(HashMap::new()),
        }
    }

    fn outcome_response(outcome: Outcome) -> Response {
        match outcome {
            Outcome::Success(result) => Response::Success { result },
            Outcome::Failure { message, detail } => Response::Failure { message, detail },
        }
    }

    async fn replace_documents(&self, models: Vec<ModelInfo>) {
        let mut documents = self.documents.lock().await;
        documents.clear();
        for model in models {
            documents.insert(model.uri.clone(), model);
        }
    }

    async fn tracked_inputs(&self) -> Vec<ModelInfo> {
        let documents = self.documents.lock().await;
        let mut inputs: Vec<ModelInfo> = documents.values().cloned().collect();
        // Stable order so the backend sees a deterministic input list.
        inputs.sort_by(|a, b| a.uri.cmp(&b.uri));
        inputs
    }

    async fn set_dependency(
        &self,
        version: Option<String>,
        key: String,
        package_id: String,
        package_folder: String,
    ) -> Response {
        let raw = version.unwrap_or_default();
        let candidates = specifier::parse(&raw);
        let request = DependencyRequest {
            key: key.clone(),
            package_id,
            package_folder,
        };

        match resolver::resolve_candidates(&candidates, &request, &self.resolvers).await {
            Ok(source) => {
                let generation = self.registry.set(key, source).await;
                debug!(generation = %generation, version = %raw, "dependency updated");
                Response::Empty
            }
            Err(error) => Response::Failure {
                message: error.to_string(),
                detail: format!("version '{}'", raw),
            },
        }
    }

    async fn dependency_info(&self, key: &str) -> Response {
        let keys = self.registry.keys().await;
        let registered = keys.iter().any(|k| k == key);
        Response::Success {
            result: serde_json::json!({
                "key": key,
                "registered": registered,
                "generation": self.registry.generation().0,
                "keys": keys,
            }),
        }
    }

    fn sdk_info(version: &str) -> Response {
        let candidates: Vec<String> = specifier::parse(version)
            .iter()
            .map(|c| c.to_string())
            .collect();
        Response::Success {
            result: serde_json::json!({
                "version": version,
                "candidates": candidates,
            }),
        }
    }

    async fn provide_completion(&self, model_uri: String, line: u32, column: u32) -> Response {
        let text = {
            let documents = self.documents.lock().await;
            documents
                .get(&model_uri)
                .map(|m| m.text.clone())
                .unwrap_or_default()
        };

        let outcome = self
            .proxy
            .invoke(BackendRequest::Complete { uri: model_uri, line, column, text })
            .await;
        Self::outcome_response(outcome)
    }

    async fn diagnostics(&self) -> Response {
        let inputs = self.tracked_inputs().await;
        let outcome = self.proxy.invoke(BackendRequest::Compile { inputs }).await;
        Self::outcome_response(outcome)
    }
}

#[async_trait::async_trait]
impl WorkerService for WorkerSession {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Compile { inputs } => {
                self.replace_documents(inputs.clone()).await;
                let outcome = self.proxy.invoke(BackendRequest::Compile { inputs }).await;
                Self::outcome_response(outcome)
            }
            Request::GetOutput { inputs, file, output_type } => {
                let outcome = self
                    .proxy
                    .invoke(BackendRequest::Output { inputs, file, output_type })
                    .await;
                Self::outcome_response(outcome)
            }
            Request::SetDependency { version, key, package_id, package_folder } => {
                self.set_dependency(version, key, package_id, package_folder).await
            }
            Request::GetDependencyInfo { key } => self.dependency_info(&key).await,
            Request::GetSdkInfo { version } => Self::sdk_info(&version),
            Request::ProvideCompletion { model_uri, position, context: _ } => {
                self.provide_completion(model_uri, position.line, position.column).await
            }
            Request::NotifyWorkspaceChanged { models } => {
                self.replace_documents(models).await;
                Response::Empty
            }
            Request::NotifyModelChanged { model_uri } => {
                // Presence is tracked lazily: an unknown model gets an
                // empty slot so later content changes have a target.
                let mut documents = self.documents.lock().await;
                documents.entry(model_uri.clone()).or_insert(ModelInfo {
                    uri: model_uri,
                    text: String::new(),
                    language: None,
                });
                Response::Empty
            }
            Request::NotifyContentChanged { change } => {
                let ContentChange { model_uri, text } = change;
                let mut documents = self.documents.lock().await;
                documents
                    .entry(model_uri.clone())
                    .and_modify(|m| m.text = text.clone())
                    .or_insert(ModelInfo {
                        uri: model_uri,
                        text,
                        language: None,
                    });
                Response::Empty
            }
            Request::GetDiagnostics => self.diagnostics().await,
        }
    }
}
