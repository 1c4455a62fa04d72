//! # Worker Client
//!
//! The foreground controller's typed surface over a worker handle.
//! High-frequency interactive calls (completion, diagnostics) pass
//! through the debounce layer before anything reaches the wire: a call
//! superseded during the quiet interval resolves to `Empty` locally and
//! the round-trip never happens.

use std::time::Duration;

use relay::Debouncer;
use relay::RequestClass;
use relay::WorkerHandle;
use relay::channel;
use relay::envelope::CompletionContext;
use relay::envelope::ContentChange;
use relay::envelope::ModelInfo;
use relay::envelope::Position;
use relay::envelope::Request;
use relay::envelope::Response;

/// Quiet interval for interactive calls when none is configured.
const DEFAULT_QUIET: Duration = Duration::from_millis(500);

/// Typed controller over a worker handle.
pub struct WorkerClient {
    handle: WorkerHandle,
    debouncer: Debouncer,
}

impl WorkerClient {
    pub fn new(handle: WorkerHandle) -> Self {
        Self::with_quiet_interval(handle, DEFAULT_QUIET)
    }

    pub fn with_quiet_interval(handle: WorkerHandle, quiet: Duration) -> Self {
        Self {
            handle,
            debouncer: Debouncer::new(quiet),
        }
    }

    pub async fn compile(&self, inputs: Vec<ModelInfo>) -> channel::Result<Response> {
        self.handle.call(Request::Compile { inputs }).await
    }

    pub async fn get_output(
        &self,
        inputs: Vec<ModelInfo>,
        file: Option<String>,
        output_type: impl Into<String>,
    ) -> channel::Result<Response> {
        self.handle
            .call(Request::GetOutput {
                inputs,
                file,
                output_type: output_type.into(),
            })
            .await
    }

    pub async fn set_dependency(
        &self,
        version: Option<String>,
        key: impl Into<String>,
        package_id: impl Into<String>,
        package_folder: impl Into<String>,
    ) -> channel::Result<Response> {
        self.handle
            .call(Request::SetDependency {
                version,
                key: key.into(),
                package_id: package_id.into(),
                package_folder: package_folder.into(),
            })
            .await
    }

    pub async fn get_dependency_info(&self, key: impl Into<String>) -> channel::Result<Response> {
        self.handle
            .call(Request::GetDependencyInfo { key: key.into() })
            .await
    }

    pub async fn get_sdk_info(&self, version: impl Into<String>) -> channel::Result<Response> {
        self.handle
            .call(Request::GetSdkInfo { version: version.into() })
            .await
    }

    pub async fn notify_workspace_changed(
        &self,
        models: Vec<ModelInfo>,
    ) -> channel::Result<Response> {
        self.handle
            .call(Request::NotifyWorkspaceChanged { models })
            .await
    }

    pub async fn notify_model_changed(
        &self,
        model_uri: impl Into<String>,
    ) -> channel::Result<Response> {
        self.handle
            .call(Request::NotifyModelChanged { model_uri: model_uri.into() })
            .await
    }

    pub async fn notify_content_changed(
        &self,
        change: ContentChange,
    ) -> channel::Result<Response> {
        self.handle
            .call(Request::NotifyContentChanged { change })
            .await
    }

    /// Debounced: a burst of completion requests collapses to the most
    /// recent one; superseded calls resolve to `Empty` without a
    /// round-trip.
    pub async fn provide_completion(
        &self,
        model_uri: impl Into<String>,
        position: Position,
        context: CompletionContext,
    ) -> channel::Result<Response> {
        let request = Request::ProvideCompletion {
            model_uri: model_uri.into(),
            position,
            context,
        };
        self.debouncer
            .debounce(RequestClass::Completion, Ok(Response::Empty), || async {
                self.handle.call(request).await
            })
            .await
    }

    /// Debounced like completion, under its own request class.
    pub async fn get_diagnostics(&self) -> channel::Result<Response> {
        self.debouncer
            .debounce(RequestClass::Diagnostics, Ok(Response::Empty), || async {
                self.handle.call(Request::GetDiagnostics).await
            })
            .await
    }
}
