//! Cancellation and deadline propagation.

use std::fmt;
use std::future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a [`Context`] stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The owning [`Shutdown`](super::Shutdown) was triggered.
    Shutdown,
    /// The context deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Shutdown => write!(f, "shutdown requested"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Error surfaced when work is abandoned because its context was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled: {reason}")]
pub struct Cancelled {
    pub reason: CancelReason,
}

impl Cancelled {
    pub fn new(reason: CancelReason) -> Self {
        Self { reason }
    }
}

/// Request-scoped cancellation signal plus an optional deadline.
///
/// Cloning is cheap; clones observe the same shutdown signal.
#[derive(Debug, Clone, Default)]
pub struct Context {
    shutdown: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub(crate) fn from_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown: Some(shutdown),
            deadline: None,
        }
    }

    /// Derive a context whose deadline is `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context with an absolute deadline (earliest deadline wins).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            shutdown: self.shutdown.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check; `Some` once the context is cancelled.
    pub fn err(&self) -> Option<Cancelled> {
        if let Some(rx) = &self.shutdown {
            if *rx.borrow() {
                return Some(Cancelled::new(CancelReason::Shutdown));
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Some(Cancelled::new(CancelReason::DeadlineExceeded))
            }
            _ => None,
        }
    }

    /// Resolves when the context is cancelled. Never resolves for [`Context::background`].
    pub async fn cancelled(&self) -> Cancelled {
        let shutdown = async {
            if let Some(rx) = &self.shutdown {
                let mut rx = rx.clone();
                let fired = rx.wait_for(|triggered| *triggered).await.is_ok();
                if fired {
                    return;
                }
            }
            // Sender gone without triggering: shutdown can no longer happen.
            future::pending::<()>().await
        };
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = shutdown => Cancelled::new(CancelReason::Shutdown),
            _ = deadline => Cancelled::new(CancelReason::DeadlineExceeded),
        }
    }
}
