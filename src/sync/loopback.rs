//! In-memory collaborator
//!
//! `LoopbackServer` plays the remote side for tests and for the CLI: it
//! keeps boards in memory, accepts full-snapshot pushes, and fans payloads
//! published by "other clients" out to live subscribers. Clones share state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::channel::{InboundSink, LiveChannel, Subscription};
use super::transport::{BoardTransport, RemoteError};
use crate::domain::{merge_remote, BoardId, BoardSnapshot, RemoteBoard};

#[derive(Debug, Default)]
struct LoopbackState {
    boards: HashMap<BoardId, BoardSnapshot>,
    subscribers: Vec<InboundSink>,
    pushes: Vec<Arc<BoardSnapshot>>,
    fail_next_push: Option<RemoteError>,
    read_only: HashSet<BoardId>,
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackServer {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a board, replacing any board with the same id
    pub fn insert_board(&self, snapshot: BoardSnapshot) {
        self.lock().boards.insert(snapshot.id.clone(), snapshot);
    }

    /// Current server-side copy of a board
    pub fn board(&self, board_id: &BoardId) -> Option<BoardSnapshot> {
        self.lock().boards.get(board_id).cloned()
    }

    /// Applies a payload from another client and delivers it to every live
    /// subscriber of the board. Returns how many subscribers received it.
    pub fn publish(&self, board_id: &BoardId, payload: RemoteBoard) -> usize {
        let mut state = self.lock();

        if let Some(current) = state.boards.get(board_id) {
            let merged = merge_remote(current, &payload).snapshot;
            state.boards.insert(board_id.clone(), merged);
        }

        state.subscribers.retain(|s| !s.is_cancelled());
        let delivered = state
            .subscribers
            .iter()
            .filter(|s| s.board_id() == board_id)
            .filter(|s| s.deliver(payload.clone()))
            .count();

        debug!(board = %board_id, delivered, "published payload");
        delivered
    }

    /// Closes every live channel for a board from the server side
    pub fn drop_channels(&self, board_id: &BoardId, reason: &str) {
        let mut state = self.lock();
        for sink in state.subscribers.iter().filter(|s| s.board_id() == board_id) {
            sink.close(reason);
        }
        state.subscribers.retain(|s| !s.is_cancelled());
    }

    /// Makes the next push fail with `error`
    pub fn fail_next_push(&self, error: RemoteError) {
        self.lock().fail_next_push = Some(error);
    }

    /// Rejects every push to this board with a permission error
    pub fn deny_writes(&self, board_id: &BoardId) {
        self.lock().read_only.insert(board_id.clone());
    }

    /// Live subscriptions currently attached to a board
    pub fn subscriber_count(&self, board_id: &BoardId) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.board_id() == board_id && !s.is_cancelled())
            .count()
    }

    /// Snapshots received through successful pushes, oldest first
    pub fn pushes(&self) -> Vec<Arc<BoardSnapshot>> {
        self.lock().pushes.clone()
    }

    fn fetch_now(&self, board_id: &BoardId) -> Result<BoardSnapshot, RemoteError> {
        self.board(board_id)
            .ok_or_else(|| RemoteError::NotFound(board_id.clone()))
    }

    fn push_now(&self, snapshot: Arc<BoardSnapshot>) -> Result<(), RemoteError> {
        let mut state = self.lock();

        if state.read_only.contains(&snapshot.id) {
            return Err(RemoteError::PermissionDenied(format!(
                "board {} is read-only",
                snapshot.id
            )));
        }
        if let Some(error) = state.fail_next_push.take() {
            return Err(error);
        }

        state
            .boards
            .insert(snapshot.id.clone(), (*snapshot).clone());
        state.pushes.push(snapshot);
        Ok(())
    }
}

impl BoardTransport for LoopbackServer {
    async fn fetch_board(&self, board_id: &BoardId) -> Result<BoardSnapshot, RemoteError> {
        self.fetch_now(board_id)
    }

    async fn push_board(&self, snapshot: Arc<BoardSnapshot>) -> Result<(), RemoteError> {
        self.push_now(snapshot)
    }
}

impl LiveChannel for LoopbackServer {
    fn subscribe(&self, board_id: &BoardId, sink: InboundSink) -> Result<Subscription, RemoteError> {
        let mut state = self.lock();
        if !state.boards.contains_key(board_id) {
            return Err(RemoteError::NotFound(board_id.clone()));
        }

        let subscription = Subscription::new(&sink);
        state.subscribers.push(sink);

        let shared = Arc::clone(&self.state);
        Ok(subscription.with_teardown(move || {
            shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .retain(|s| !s.is_cancelled());
        }))
    }
}
