//! # Frame Transport
//!
//! A minimal async interface for moving opaque frames between the
//! controller and the worker. The transport knows nothing about envelopes
//! or correlation; it moves byte buffers.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Error {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A mechanism to send and receive byte frames.
///
/// Designed to be object-safe (`Arc<dyn FrameTransport>`).
///
/// # invariants
/// - `recv` returns `Ok(None)` exactly once, when the stream closes.
/// - Frames arrive in the order they were sent.
/// - The transport never interprets frame contents.
#[async_trait::async_trait]
pub trait FrameTransport: Send + Sync + 'static {
    async fn send(&self, frame: &[u8]) -> Result<()>;

    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}

/// An in-process duplex transport over unbounded mpsc channels.
///
/// Frames sent on one half appear on the other half's `recv` and vice
/// versa. Used by tests and by same-process worker wiring.
pub struct DuplexTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl DuplexTransport {
    /// Creates a connected pair of transports.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Self {
            tx: tx_a,
            rx: Arc::new(Mutex::new(rx_b)),
        };

        let b = Self {
            tx: tx_b,
            rx: Arc::new(Mutex::new(rx_a)),
        };

        (a, b)
    }
}

#[async_trait::async_trait]
impl FrameTransport for DuplexTransport {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| Error::ConnectionLost("Channel closed".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}
