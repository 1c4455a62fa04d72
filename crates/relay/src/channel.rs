//! # RPC Channel
//!
//! Correlated request/response passing over a frame transport. The sender
//! allocates monotonically increasing ids; a single pump task reads every
//! incoming frame and pushes paired responses onto an ordered queue.
//!
//! Retrieval for id N repeatedly peeks the queue head: if the head's id is
//! N it is dequeued and returned, otherwise the caller parks until the next
//! arrival and checks again. Responses are therefore drained in FIFO
//! arrival order relative to whichever id is being awaited: callers on a
//! shared channel must retrieve responses in the order requests were
//! issued, or use independent channels. True out-of-order consumption is
//! deliberately unsupported.
//!
//! A single malformed or unpaired frame never terminates the pump.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

use crate::envelope::Envelope;
use crate::envelope::Request;
use crate::envelope::Response;
use crate::transport;
use crate::transport::FrameTransport;

#[derive(Debug, Clone)]
pub enum Error {
    Transport(transport::Error),
    /// Envelope serialization failed on the send path.
    Codec(String),
    /// The pump terminated; no further responses will arrive.
    ChannelClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(msg) => write!(f, "Codec error: {}", msg),
            Self::ChannelClosed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

struct Shared {
    queue: Mutex<VecDeque<Envelope<Response>>>,
    /// Bumped after every queue push and on close; waiters re-check on change.
    arrivals: watch::Sender<u64>,
    ready: watch::Sender<bool>,
    closed: AtomicBool,
}

impl Shared {
    fn wake(&self) {
        self.arrivals.send_modify(|v| *v += 1);
    }
}

/// Controller end of a correlated request/response channel.
pub struct RpcChannel {
    transport: Arc<dyn FrameTransport>,
    next_id: AtomicI64,
    shared: Arc<Shared>,
}

impl RpcChannel {
    /// Creates the channel and spawns its pump task.
    pub fn new(transport: Arc<dyn FrameTransport>) -> Self {
        let (arrivals, _) = watch::channel(0u64);
        let (ready, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            arrivals,
            ready,
            closed: AtomicBool::new(false),
        });

        let pump_transport = transport.clone();
        let pump_shared = shared.clone();
        tokio::spawn(async move {
            Self::pump(pump_transport, pump_shared).await;
        });

        Self {
            transport,
            next_id: AtomicI64::new(1),
            shared,
        }
    }

    /// Reads frames until the transport closes or fails.
    async fn pump(transport: Arc<dyn FrameTransport>, shared: Arc<Shared>) {
        loop {
            match transport.recv().await {
                Ok(Some(frame)) => {
                    let envelope: Envelope<Response> = match serde_json::from_slice(&frame) {
                        Ok(envelope) => envelope,
                        Err(error) => {
                            warn!(%error, "malformed frame skipped");
                            continue;
                        }
                    };

                    // The Ready handshake unblocks startup; its id is ignored.
                    if matches!(envelope.payload, Response::Ready) {
                        debug!("worker ready");
                        let _ = shared.ready.send(true);
                        continue;
                    }

                    if envelope.id < 0 {
                        warn!(id = envelope.id, "unpaired frame dropped");
                        continue;
                    }

                    shared.queue.lock().await.push_back(envelope);
                    shared.wake();
                }
                Ok(None) => {
                    debug!("transport stream closed");
                    break;
                }
                Err(error) => {
                    warn!(%error, "transport failed; closing channel");
                    break;
                }
            }
        }

        shared.closed.store(true, Ordering::SeqCst);
        shared.wake();
        // Wake startup waiters too, so they observe the close.
        shared.ready.send_modify(|_| {});
    }

    /// Waits for the worker's Ready handshake.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut ready = self.shared.ready.subscribe();
        loop {
            if *ready.borrow_and_update() {
                return Ok(());
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(Error::ChannelClosed);
            }
            if ready.changed().await.is_err() {
                return Err(Error::ChannelClosed);
            }
        }
    }

    /// Sends a request and awaits the response carrying the same id.
    pub async fn call(&self, request: Request) -> Result<Response> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope::new(id, request);
        let frame =
            serde_json::to_vec(&envelope).map_err(|e| Error::Codec(e.to_string()))?;
        self.transport.send(&frame).await?;
        self.receive(id).await
    }

    /// Awaits the response for one id, draining the queue head-first.
    pub async fn receive(&self, id: i64) -> Result<Response> {
        let mut arrivals = self.shared.arrivals.subscribe();
        loop {
            {
                let mut queue = self.shared.queue.lock().await;
                if queue.front().map(|head| head.id) == Some(id) {
                    if let Some(envelope) = queue.pop_front() {
                        // The head changed; other waiters must re-check.
                        drop(queue);
                        self.shared.wake();
                        return Ok(envelope.payload);
                    }
                }
                // Once the pump is dead, a response that isn't already
                // queued can never arrive.
                if self.shared.closed.load(Ordering::SeqCst)
                    && !queue.iter().any(|e| e.id == id)
                {
                    return Err(Error::ChannelClosed);
                }
            }
            if arrivals.changed().await.is_err() {
                return Err(Error::ChannelClosed);
            }
        }
    }
}
