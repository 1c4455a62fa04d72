//! # Debounce / Cancel Layer
//!
//! Single-slot cancellation coordination for latest-request-wins
//! interactive calls. Each request class holds one cancellation handle;
//! a new call cancels and replaces it, then waits out a quiet interval
//! before doing any work. Rapid repeated calls therefore collapse to the
//! most recent one, bounding the rate of expensive downstream work.
//!
//! Cancellation is scoped to one class's in-flight request; it never
//! touches other classes or the channel itself.

use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Classes of interactive requests debounced independently.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum RequestClass {
    Completion,
    Diagnostics,
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completion => write!(f, "completion"),
            Self::Diagnostics => write!(f, "diagnostics"),
        }
    }
}

/// Per-class single-slot debouncer.
pub struct Debouncer {
    quiet: Duration,
    slots: DashMap<RequestClass, CancellationToken>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            slots: DashMap::new(),
        }
    }

    /// Cancels the class's current handle, installs a new one, and waits
    /// the quiet interval. Returns `fallback` if superseded during the
    /// wait; otherwise runs `work` and returns its output. `work` itself
    /// runs to completion once started.
    pub async fn debounce<T, F, Fut>(&self, class: RequestClass, fallback: T, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.slots.insert(class, token.clone()) {
            previous.cancel();
        }

        tokio::select! {
            _ = token.cancelled() => fallback,
            _ = tokio::time::sleep(self.quiet) => work().await,
        }
    }
}
