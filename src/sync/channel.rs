//! Live channel collaborator and the session's event queue
//!
//! Inbound payloads, channel closures and push completions all flow into one
//! unbounded tokio mpsc queue consumed by the session. Each subscription is
//! tagged with the generation it was opened under so the consumer can drop
//! anything that arrives after a board switch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::transport::RemoteError;
use crate::domain::{BoardId, RemoteBoard};

/// Events consumed by the session loop
#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    Inbound {
        generation: u64,
        payload: RemoteBoard,
    },
    ChannelClosed {
        generation: u64,
        reason: String,
    },
    PushCompleted {
        push_id: u64,
        board_id: BoardId,
        result: Result<(), RemoteError>,
    },
}

/// Where a live channel delivers inbound payloads for one subscription
#[derive(Clone)]
pub struct InboundSink {
    board_id: BoardId,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
    cancelled: Arc<AtomicBool>,
}

impl fmt::Debug for InboundSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundSink")
            .field("board_id", &self.board_id)
            .field("generation", &self.generation)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl InboundSink {
    pub(crate) fn new(
        board_id: BoardId,
        generation: u64,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            board_id,
            generation,
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    /// Forwards a payload to the session.
    ///
    /// Returns false once the subscription is cancelled or the session is gone;
    /// channels should stop delivering at that point.
    pub fn deliver(&self, payload: RemoteBoard) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx
            .send(SessionEvent::Inbound {
                generation: self.generation,
                payload,
            })
            .is_ok()
    }

    /// Reports that the channel closed on its own (server side, network)
    pub fn close(&self, reason: impl Into<String>) {
        if self.is_cancelled() {
            return;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.tx.send(SessionEvent::ChannelClosed {
            generation: self.generation,
            reason: reason.into(),
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

/// Reports one push's result to the session exactly once.
///
/// A report dropped without a result (the push task panicked or was
/// cancelled) reports a failure, so the session never waits on it forever.
pub(crate) struct PushReport {
    push_id: u64,
    board_id: BoardId,
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl PushReport {
    pub(crate) fn new(push_id: u64, board_id: BoardId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            push_id,
            board_id,
            tx: Some(tx),
        }
    }

    pub(crate) fn finish(mut self, result: Result<(), RemoteError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<(), RemoteError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(SessionEvent::PushCompleted {
                push_id: self.push_id,
                board_id: self.board_id.clone(),
                result,
            });
        }
    }
}

impl Drop for PushReport {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(push = self.push_id, board = %self.board_id, "push ended without a result");
            self.send(Err(RemoteError::Unavailable(
                "push ended without a result".to_string(),
            )));
        }
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Cancellation handle for a live subscription.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription {
    board_id: BoardId,
    cancelled: Arc<AtomicBool>,
    teardown: Option<Teardown>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("board_id", &self.board_id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Handle sharing the sink's cancellation flag
    pub fn new(sink: &InboundSink) -> Self {
        Self {
            board_id: sink.board_id.clone(),
            cancelled: sink.cancel_flag(),
            teardown: None,
        }
    }

    /// Runs `teardown` once when the subscription is cancelled
    pub fn with_teardown(mut self, teardown: impl FnOnce() + Send + 'static) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(teardown) = self.teardown.take() {
            debug!(board = %self.board_id, "tearing down live subscription");
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A push channel delivering inbound board payloads
pub trait LiveChannel {
    /// Starts delivering payloads for `board_id` into `sink` until the
    /// returned handle is cancelled or dropped
    fn subscribe(&self, board_id: &BoardId, sink: InboundSink) -> Result<Subscription, RemoteError>;
}
