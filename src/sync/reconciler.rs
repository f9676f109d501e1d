//! Sync reconciler
//!
//! Per-board state machine sitting between the store and the remote side:
//!
//! - local mutations queue one best-effort push of the full snapshot
//!   (`Idle -> Syncing -> Idle`), never retried;
//! - inbound payloads pass through `Reconciling` and replace every
//!   top-level field they carry (remote wins);
//! - every board switch bumps the channel generation so late messages from
//!   the previous subscription can be recognized and dropped.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::transport::RemoteError;
use crate::domain::{merge_remote, BoardId, BoardSnapshot, RemoteBoard};
use crate::error::{PermissionError, SyncError};
use crate::store::NormalizedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// An outbound push is in flight
    Syncing,
    /// An inbound payload is being merged
    Reconciling,
}

/// A full snapshot waiting to be pushed
#[derive(Debug, Clone)]
pub struct OutboundPush {
    pub id: u64,
    pub board_id: BoardId,
    pub snapshot: Arc<BoardSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoActiveBoard,
    /// Tagged with a generation from a torn-down subscription
    StaleChannel,
    /// Names a board other than the active one
    ForeignBoard,
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    Ignored(IgnoreReason),
    /// Payload matched the current state; store identity kept
    Unchanged,
    Replaced {
        store: NormalizedStore,
        replaced_fields: Vec<&'static str>,
    },
}

/// Non-fatal problems surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    PushFailed { board_id: BoardId, error: SyncError },
    PermissionDenied(PermissionError),
    /// The live channel could not be opened; the board stays open without it
    ChannelUnavailable { board_id: BoardId, error: SyncError },
    ChannelClosed { board_id: BoardId, reason: String },
}

impl std::fmt::Display for SyncNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PushFailed { error, .. } => write!(f, "{error}"),
            Self::PermissionDenied(error) => write!(f, "{error}"),
            Self::ChannelUnavailable { error, .. } => write!(f, "{error}"),
            Self::ChannelClosed { board_id, reason } => {
                write!(f, "Live channel for board {board_id} closed: {reason}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncReconciler {
    board_id: Option<BoardId>,
    generation: u64,
    state: SyncState,
    next_push_id: u64,
    queued: Option<OutboundPush>,
    in_flight: HashSet<u64>,
}

impl SyncReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board_id(&self) -> Option<&BoardId> {
        self.board_id.as_ref()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts tracking a board. Returns the generation new subscriptions
    /// must be tagged with.
    pub fn attach(&mut self, board_id: BoardId) -> u64 {
        self.generation += 1;
        info!(board = %board_id, generation = self.generation, "attached to board");
        self.board_id = Some(board_id);
        self.reset();
        self.generation
    }

    /// Stops tracking the current board; anything still in the queue for it
    /// becomes stale
    pub fn detach(&mut self) {
        if let Some(board) = self.board_id.take() {
            info!(board = %board, "detached from board");
        }
        self.generation += 1;
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SyncState::Idle;
        self.queued = None;
        self.in_flight.clear();
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.board_id.is_some() && generation == self.generation
    }

    /// Queues a push of the store's snapshot, superseding any push not yet
    /// taken. Returns the push id.
    pub fn record_local_mutation(&mut self, store: &NormalizedStore) -> Option<u64> {
        let board_id = self.board_id.as_ref()?;
        if board_id != store.board_id() {
            warn!(
                active = %board_id,
                store = %store.board_id(),
                "mutation on a store for a different board; not queued"
            );
            return None;
        }

        self.next_push_id += 1;
        let id = self.next_push_id;
        if let Some(previous) = self.queued.replace(OutboundPush {
            id,
            board_id: board_id.clone(),
            snapshot: store.snapshot(),
        }) {
            debug!(superseded = previous.id, push = id, "queued push superseded");
        }
        Some(id)
    }

    /// Hands the queued push to the caller and marks it in flight
    pub fn take_outbound(&mut self) -> Option<OutboundPush> {
        let push = self.queued.take()?;
        self.in_flight.insert(push.id);
        self.state = SyncState::Syncing;
        debug!(push = push.id, board = %push.board_id, "push in flight");
        Some(push)
    }

    /// Records the result of a push. Failures become notices; local state is
    /// never rolled back. Results for a board no longer attached are dropped.
    pub fn complete_push(
        &mut self,
        push_id: u64,
        board_id: &BoardId,
        result: Result<(), RemoteError>,
    ) -> Option<SyncNotice> {
        if self.board_id.as_ref() != Some(board_id) {
            debug!(
                push = push_id,
                board = %board_id,
                ok = result.is_ok(),
                "dropping push result for detached board"
            );
            return None;
        }
        if self.in_flight.remove(&push_id) {
            self.settle_state();
        }

        match result {
            Ok(()) => {
                debug!(push = push_id, board = %board_id, "push completed");
                None
            }
            Err(RemoteError::PermissionDenied(reason)) => {
                warn!(push = push_id, board = %board_id, %reason, "push rejected");
                Some(SyncNotice::PermissionDenied(PermissionError {
                    board: board_id.clone(),
                    action: "push",
                    reason,
                }))
            }
            Err(error) => {
                warn!(push = push_id, board = %board_id, %error, "push failed");
                Some(SyncNotice::PushFailed {
                    board_id: board_id.clone(),
                    error: SyncError::Push {
                        board: board_id.clone(),
                        reason: error.to_string(),
                    },
                })
            }
        }
    }

    /// Merges an inbound payload into the current store
    pub fn reconcile(
        &mut self,
        generation: u64,
        current: Option<&NormalizedStore>,
        payload: &RemoteBoard,
    ) -> ReconcileOutcome {
        if !self.is_current(generation) {
            warn!(
                generation,
                current = self.generation,
                "ignoring inbound payload from stale channel"
            );
            return ReconcileOutcome::Ignored(IgnoreReason::StaleChannel);
        }
        let Some(store) = current else {
            return ReconcileOutcome::Ignored(IgnoreReason::NoActiveBoard);
        };
        if let Some(id) = &payload.id {
            if id != store.board_id() {
                warn!(payload = %id, active = %store.board_id(), "ignoring payload for another board");
                return ReconcileOutcome::Ignored(IgnoreReason::ForeignBoard);
            }
        }

        self.state = SyncState::Reconciling;
        let merged = merge_remote(&store.snapshot(), payload);
        self.settle_state();

        if !merged.changed {
            debug!(board = %store.board_id(), "inbound payload matches local state");
            return ReconcileOutcome::Unchanged;
        }

        if merged.repaired > 0 {
            warn!(
                board = %store.board_id(),
                dropped = merged.repaired,
                "inbound payload named missing or repeated entries; dropped them"
            );
        }
        let next = store.replace(merged.snapshot);
        debug!(board = %store.board_id(), fields = ?merged.replaced_fields, "inbound payload merged");

        ReconcileOutcome::Replaced {
            store: next,
            replaced_fields: merged.replaced_fields,
        }
    }

    /// Turns a channel closure into a notice, unless it belongs to an old
    /// subscription
    pub fn channel_closed(&mut self, generation: u64, reason: String) -> Option<SyncNotice> {
        if !self.is_current(generation) {
            debug!(generation, "stale channel closed");
            return None;
        }
        let board_id = self.board_id.clone()?;
        warn!(board = %board_id, %reason, "live channel closed");
        Some(SyncNotice::ChannelClosed { board_id, reason })
    }

    /// True while a push is queued or in flight
    pub fn has_pending(&self) -> bool {
        self.queued.is_some() || !self.in_flight.is_empty()
    }

    fn settle_state(&mut self) {
        self.state = if self.in_flight.is_empty() {
            SyncState::Idle
        } else {
            SyncState::Syncing
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::*;

    fn setup() -> (SyncReconciler, NormalizedStore, u64) {
        let store = NormalizedStore::new(board(&[("L1", &["A", "B"])]));
        let mut rec = SyncReconciler::new();
        let generation = rec.attach(store.board_id().clone());
        (rec, store, generation)
    }

    #[test]
    fn push_lifecycle() {
        let (mut rec, store, _) = setup();
        assert_eq!(rec.state(), SyncState::Idle);

        let id = rec.record_local_mutation(&store).unwrap();
        assert!(rec.has_pending());

        let push = rec.take_outbound().unwrap();
        assert_eq!(push.id, id);
        assert_eq!(rec.state(), SyncState::Syncing);
        assert!(rec.take_outbound().is_none());

        assert!(rec.complete_push(id, store.board_id(), Ok(())).is_none());
        assert_eq!(rec.state(), SyncState::Idle);
        assert!(!rec.has_pending());
    }

    #[test]
    fn newer_mutation_supersedes_queued_push() {
        let (mut rec, store, _) = setup();
        rec.record_local_mutation(&store);
        let second = rec.record_local_mutation(&store).unwrap();

        assert_eq!(rec.take_outbound().unwrap().id, second);
    }

    #[test]
    fn failed_push_becomes_notice() {
        let (mut rec, store, _) = setup();
        let id = rec.record_local_mutation(&store).unwrap();
        rec.take_outbound();

        let notice = rec
            .complete_push(
                id,
                store.board_id(),
                Err(RemoteError::Unavailable("offline".to_string())),
            )
            .unwrap();
        assert!(matches!(notice, SyncNotice::PushFailed { .. }));
        assert_eq!(rec.state(), SyncState::Idle);

        let denied = rec
            .complete_push(
                id + 1,
                store.board_id(),
                Err(RemoteError::PermissionDenied("viewer".to_string())),
            )
            .unwrap();
        assert!(matches!(denied, SyncNotice::PermissionDenied(_)));
    }

    #[test]
    fn push_result_for_detached_board_is_dropped() {
        let (mut rec, store, _) = setup();
        let id = rec.record_local_mutation(&store).unwrap();
        rec.take_outbound();

        rec.attach("b2".parse().unwrap());
        let notice = rec.complete_push(
            id,
            store.board_id(),
            Err(RemoteError::Unavailable("offline".to_string())),
        );

        assert!(notice.is_none());
        assert_eq!(rec.state(), SyncState::Idle);
        assert!(!rec.has_pending());
    }

    #[test]
    fn identical_payload_is_unchanged() {
        let (mut rec, store, generation) = setup();
        let payload = RemoteBoard::from((*store.snapshot()).clone());

        let outcome = rec.reconcile(generation, Some(&store), &payload);

        assert!(matches!(outcome, ReconcileOutcome::Unchanged));
        assert_eq!(rec.state(), SyncState::Idle);
    }

    #[test]
    fn changed_payload_replaces_store() {
        let (mut rec, store, generation) = setup();
        let payload = RemoteBoard {
            title: Some("Remote title".to_string()),
            ..RemoteBoard::default()
        };

        match rec.reconcile(generation, Some(&store), &payload) {
            ReconcileOutcome::Replaced {
                store: next,
                replaced_fields,
            } => {
                assert_eq!(next.snapshot().title, "Remote title");
                assert_eq!(replaced_fields, vec!["title"]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn partial_lists_payload_cannot_break_invariants() {
        let store = NormalizedStore::new(board(&[("L1", &["A"]), ("L2", &["B"])]));
        let mut rec = SyncReconciler::new();
        let generation = rec.attach(store.board_id().clone());

        let mut lists = store.snapshot().lists.clone();
        lists.remove(&lid("L2"));
        let payload = RemoteBoard {
            lists: Some(lists),
            ..RemoteBoard::default()
        };

        match rec.reconcile(generation, Some(&store), &payload) {
            ReconcileOutcome::Replaced { store: next, .. } => {
                assert!(next.check_invariants().is_empty());
                assert_eq!(next.snapshot().list_ids, vec![lid("L1")]);
                assert_eq!(next.orphaned_tasks(), vec![tid("B")]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn stale_and_foreign_payloads_are_ignored() {
        let (mut rec, store, generation) = setup();
        let payload = RemoteBoard {
            title: Some("late".to_string()),
            ..RemoteBoard::default()
        };

        let new_generation = rec.attach(store.board_id().clone());
        assert!(matches!(
            rec.reconcile(generation, Some(&store), &payload),
            ReconcileOutcome::Ignored(IgnoreReason::StaleChannel)
        ));

        let foreign = RemoteBoard {
            id: Some("other-board".parse().unwrap()),
            ..payload
        };
        assert!(matches!(
            rec.reconcile(new_generation, Some(&store), &foreign),
            ReconcileOutcome::Ignored(IgnoreReason::ForeignBoard)
        ));
        assert!(matches!(
            rec.reconcile(new_generation, None, &foreign),
            ReconcileOutcome::Ignored(IgnoreReason::NoActiveBoard)
        ));
    }

    #[test]
    fn channel_closed_only_reports_current_generation() {
        let (mut rec, _store, generation) = setup();
        assert!(rec.channel_closed(generation, "bye".to_string()).is_some());

        rec.detach();
        assert!(rec.channel_closed(generation, "bye".to_string()).is_none());
        assert!(rec.board_id().is_none());
    }
}
