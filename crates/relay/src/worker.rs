//! # Worker Endpoint
//!
//! The service contract implemented by the background execution unit, the
//! serve loop that drives it over a transport, and the handle through
//! which a controller reaches it: remotely over a channel, or directly
//! in-process when no remote execution unit is available.

use std::sync::Arc;

use tracing::warn;

use crate::channel;
use crate::channel::RpcChannel;
use crate::envelope::Envelope;
use crate::envelope::Request;
use crate::envelope::Response;
use crate::transport;
use crate::transport::FrameTransport;

/// The background execution unit's typed surface.
#[async_trait::async_trait]
pub trait WorkerService: Send + Sync + 'static {
    /// Handles one request. Never fails: failures are failure-shaped
    /// responses.
    async fn handle(&self, request: Request) -> Response;
}

/// Drives a worker service over a transport.
///
/// Announces readiness with an unpaired Ready frame, then serves requests
/// in arrival order, replying under the request's id. Malformed frames
/// are logged and skipped; the loop only ends when the stream closes.
pub async fn serve(
    transport: Arc<dyn FrameTransport>,
    service: Arc<dyn WorkerService>,
) -> transport::Result<()> {
    let ready = Envelope::unpaired(Response::Ready);
    let frame = serde_json::to_vec(&ready)
        .map_err(|e| transport::Error::Io(e.to_string()))?;
    transport.send(&frame).await?;

    loop {
        let Some(frame) = transport.recv().await? else {
            return Ok(());
        };

        let envelope: Envelope<Request> = match serde_json::from_slice(&frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, "malformed request frame skipped");
                continue;
            }
        };

        let response = service.handle(envelope.payload).await;
        let reply = Envelope::new(envelope.id, response);
        let frame = serde_json::to_vec(&reply)
            .map_err(|e| transport::Error::Io(e.to_string()))?;
        transport.send(&frame).await?;
    }
}

/// A controller's route to the worker.
///
/// `Remote` round-trips envelopes over a channel. `Local` is the
/// degenerate mode: calls are served synchronously in-process, bypassing
/// serialization, and the typed result is returned directly.
#[derive(Clone)]
pub enum WorkerHandle {
    Remote(Arc<RpcChannel>),
    Local(Arc<dyn WorkerService>),
}

impl WorkerHandle {
    pub async fn call(&self, request: Request) -> channel::Result<Response> {
        match self {
            Self::Remote(chan) => chan.call(request).await,
            Self::Local(service) => Ok(service.handle(request).await),
        }
    }
}
