//! Board session
//!
//! The application context the presentation layer talks to. A session owns
//! at most one open board: its store, its reconciler and its live
//! subscription. Commands mutate the store synchronously and optimistically;
//! pushes run as spawned tokio tasks and report back, together with inbound
//! payloads, through a single queue drained by [`BoardSession::next_event`].

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{
    BoardId, BoardSnapshot, DependencyGraph, FilterCriteria, FilterMemo, FilteredBoard, ListId,
    Member, MoveCommand, TaskId,
};
use crate::error::{BoardError, PermissionError, SyncError, ValidationError};
use crate::store::{NormalizedStore, TaskEdit};
use crate::sync::{
    BoardTransport, IgnoreReason, InboundSink, LiveChannel, OutboundPush, PushReport,
    ReconcileOutcome, RemoteError, SessionEvent, Subscription, SyncNotice, SyncReconciler,
    SyncState,
};

/// What processing one queued event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// An inbound payload replaced these fields
    Merged { replaced_fields: Vec<&'static str> },
    /// An inbound payload matched the current state
    Unchanged,
    Ignored(IgnoreReason),
    PushCompleted { push_id: u64, ok: bool },
    ChannelClosed,
}

pub struct BoardSession<T: BoardTransport, C: LiveChannel> {
    transport: Arc<T>,
    channel: C,
    config: Config,
    store: Option<NormalizedStore>,
    reconciler: SyncReconciler,
    subscription: Option<Subscription>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    notices: Vec<SyncNotice>,
    memo: FilterMemo,
}

impl<T: BoardTransport, C: LiveChannel> BoardSession<T, C> {
    pub fn new(transport: Arc<T>, channel: C, config: Config) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            channel,
            config,
            store: None,
            reconciler: SyncReconciler::new(),
            subscription: None,
            events_tx,
            events_rx,
            notices: Vec::new(),
            memo: FilterMemo::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Switches to a board: tears down the previous subscription, fetches
    /// the board, then subscribes to its live channel.
    ///
    /// A failed subscription is reported as a notice; the fetched board
    /// stays open.
    pub async fn open_board(&mut self, board_id: &BoardId) -> Result<Arc<BoardSnapshot>, BoardError> {
        self.teardown_subscription();
        self.store = None;
        let generation = self.reconciler.attach(board_id.clone());

        let snapshot = match self.transport.fetch_board(board_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.reconciler.detach();
                return Err(remote_error(board_id, "fetch", error, |board, reason| {
                    SyncError::Fetch { board, reason }
                }));
            }
        };

        let store = NormalizedStore::new(snapshot);
        let current = store.snapshot();
        self.store = Some(store);

        let sink = InboundSink::new(board_id.clone(), generation, self.events_tx.clone());
        match self.channel.subscribe(board_id, sink) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(error) => {
                warn!(board = %board_id, %error, "live channel unavailable");
                let notice = match error {
                    RemoteError::PermissionDenied(reason) => SyncNotice::PermissionDenied(PermissionError {
                        board: board_id.clone(),
                        action: "subscribe",
                        reason,
                    }),
                    other => SyncNotice::ChannelUnavailable {
                        board_id: board_id.clone(),
                        error: SyncError::Channel {
                            board: board_id.clone(),
                            reason: other.to_string(),
                        },
                    },
                };
                self.notices.push(notice);
            }
        }

        info!(
            board = %board_id,
            lists = current.list_ids.len(),
            tasks = current.tasks.len(),
            "board opened"
        );
        Ok(current)
    }

    /// Closes the open board, cancelling its subscription
    pub fn close(&mut self) {
        self.teardown_subscription();
        self.reconciler.detach();
        self.store = None;
    }

    fn teardown_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            info!(board = %subscription.board_id(), "closing live subscription");
            subscription.cancel();
        }
    }

    /// Current snapshot of the open board
    pub fn snapshot(&self) -> Option<Arc<BoardSnapshot>> {
        self.store.as_ref().map(NormalizedStore::snapshot)
    }

    pub fn store(&self) -> Option<&NormalizedStore> {
        self.store.as_ref()
    }

    pub fn sync_state(&self) -> SyncState {
        self.reconciler.state()
    }

    pub fn has_live_channel(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    fn active(&self) -> Result<&NormalizedStore, BoardError> {
        self.store
            .as_ref()
            .ok_or(BoardError::Validation(ValidationError::NoActiveBoard))
    }

    /// Installs a new store and queues a push of it
    fn commit(&mut self, next: NormalizedStore) {
        if self.config.sync.push_on_mutation {
            self.reconciler.record_local_mutation(&next);
        }
        self.store = Some(next);
        self.flush_push();
    }

    fn flush_push(&mut self) {
        let Some(push) = self.reconciler.take_outbound() else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(&self.transport);
                let OutboundPush {
                    id,
                    board_id,
                    snapshot,
                } = push;
                // Reports a failure if the task never gets to finish
                let report = PushReport::new(id, board_id, self.events_tx.clone());
                handle.spawn(async move {
                    report.finish(transport.push_board(snapshot).await);
                });
            }
            Err(_) => {
                let error = RemoteError::Unavailable("no async runtime to push from".to_string());
                if let Some(notice) = self.reconciler.complete_push(push.id, &push.board_id, Err(error)) {
                    self.notices.push(notice);
                }
            }
        }
    }

    /// Applies a drag-and-drop move. Returns false for a no-op move, which
    /// queues no push.
    pub fn move_item(&mut self, command: &MoveCommand) -> Result<bool, BoardError> {
        match self.active()?.apply_move(command)? {
            Some(next) => {
                debug!(?command, "move applied");
                self.commit(next);
                Ok(true)
            }
            None => {
                debug!(?command, "move left board unchanged");
                Ok(false)
            }
        }
    }

    pub fn create_task(&mut self, list_id: &ListId, title: &str) -> Result<TaskId, BoardError> {
        let (next, id) = self.active()?.create_task(list_id, title, Utc::now())?;
        debug!(task = %id, list = %list_id, "task created");
        self.commit(next);
        Ok(id)
    }

    pub fn create_list(&mut self, title: &str) -> Result<ListId, BoardError> {
        let (next, id) = self.active()?.create_list(title, Utc::now())?;
        debug!(list = %id, "list created");
        self.commit(next);
        Ok(id)
    }

    /// Removes a list; its tasks are left orphaned in the task map
    pub fn delete_list(&mut self, list_id: &ListId) -> Result<(), BoardError> {
        let next = self.active()?.remove_list(list_id)?;
        debug!(list = %list_id, orphaned = next.orphaned_tasks().len(), "list deleted");
        self.commit(next);
        Ok(())
    }

    pub fn delete_task(&mut self, task_id: &TaskId) -> Result<(), BoardError> {
        let next = self.active()?.remove_task(task_id)?;
        debug!(task = %task_id, "task deleted");
        self.commit(next);
        Ok(())
    }

    pub fn rename_list(&mut self, list_id: &ListId, title: &str) -> Result<(), BoardError> {
        let next = self.active()?.rename_list(list_id, title)?;
        self.commit(next);
        Ok(())
    }

    pub fn duplicate_task(&mut self, task_id: &TaskId) -> Result<TaskId, BoardError> {
        let suffix = self.config.tasks.copy_suffix.clone();
        let (next, id) = self
            .active()?
            .duplicate_task(task_id, Utc::now(), &suffix)?;
        debug!(task = %task_id, copy = %id, "task duplicated");
        self.commit(next);
        Ok(id)
    }

    pub fn edit_task(&mut self, task_id: &TaskId, edit: &TaskEdit) -> Result<(), BoardError> {
        let next = self.active()?.edit_task(task_id, edit, Utc::now())?;
        debug!(task = %task_id, edit = edit.kind(), "task edited");
        self.commit(next);
        Ok(())
    }

    pub fn add_member(&mut self, member: Member) -> Result<(), BoardError> {
        let next = self.active()?.add_member(member);
        self.commit(next);
        Ok(())
    }

    /// Toggles `task -> target`. Cycles are accepted but logged.
    pub fn toggle_dependency(&mut self, task: &TaskId, target: &TaskId) -> Result<bool, BoardError> {
        let (next, added) = self.active()?.toggle_dependency(task, target)?;

        if added {
            let cycles = DependencyGraph::from_snapshot(&next.snapshot()).cycles();
            if !cycles.is_empty() {
                warn!(task = %task, target = %target, cycles = cycles.len(), "dependency graph is cyclic");
            }
        }

        self.commit(next);
        Ok(added)
    }

    /// True if every dependency of the task has a complete (or empty) checklist
    pub fn is_satisfied(&self, task: &TaskId) -> Result<bool, BoardError> {
        let snapshot = self.active()?.snapshot();
        if snapshot.task(task).is_none() {
            return Err(ValidationError::UnknownTask(task.clone()).into());
        }
        Ok(DependencyGraph::from_snapshot(&snapshot).is_satisfied(task, &snapshot))
    }

    /// Visible tasks per list, evaluated against today's local date
    pub fn filter(&mut self, criteria: &FilterCriteria) -> Result<FilteredBoard, BoardError> {
        self.filter_on(criteria, Local::now().date_naive())
    }

    pub fn filter_on(&mut self, criteria: &FilterCriteria, today: NaiveDate) -> Result<FilteredBoard, BoardError> {
        let snapshot = self.active()?.snapshot();
        Ok(self.memo.view(&snapshot, criteria, today).clone())
    }

    /// Criteria for the "due soon" toggle, using the configured window
    pub fn due_soon(&self) -> FilterCriteria {
        FilterCriteria::due_within(self.config.filter.due_window_days)
    }

    pub fn notices(&self) -> &[SyncNotice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<SyncNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Waits for and processes the next queued event
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let event = self.events_rx.recv().await?;
        Some(self.handle_event(event))
    }

    /// Processes every event already queued, without waiting
    pub fn drain_events(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            updates.push(self.handle_event(event));
        }
        updates
    }

    /// Waits until no push is queued or in flight, then drains the queue
    pub async fn settle(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while self.reconciler.has_pending() {
            match self.next_event().await {
                Some(update) => updates.push(update),
                None => break,
            }
        }
        updates.extend(self.drain_events());
        updates
    }

    fn handle_event(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::Inbound {
                generation,
                payload,
            } => match self
                .reconciler
                .reconcile(generation, self.store.as_ref(), &payload)
            {
                ReconcileOutcome::Replaced {
                    store,
                    replaced_fields,
                } => {
                    self.store = Some(store);
                    SessionUpdate::Merged { replaced_fields }
                }
                ReconcileOutcome::Unchanged => SessionUpdate::Unchanged,
                ReconcileOutcome::Ignored(reason) => SessionUpdate::Ignored(reason),
            },
            SessionEvent::ChannelClosed { generation, reason } => {
                if let Some(notice) = self.reconciler.channel_closed(generation, reason) {
                    self.notices.push(notice);
                    self.subscription = None;
                }
                SessionUpdate::ChannelClosed
            }
            SessionEvent::PushCompleted {
                push_id,
                board_id,
                result,
            } => {
                let ok = result.is_ok();
                if let Some(notice) = self.reconciler.complete_push(push_id, &board_id, result) {
                    self.notices.push(notice);
                }
                SessionUpdate::PushCompleted { push_id, ok }
            }
        }
    }
}

fn remote_error(
    board: &BoardId,
    action: &'static str,
    error: RemoteError,
    sync: impl FnOnce(BoardId, String) -> SyncError,
) -> BoardError {
    match error {
        RemoteError::PermissionDenied(reason) => PermissionError {
            board: board.clone(),
            action,
            reason,
        }
        .into(),
        other => sync(board.clone(), other.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::*;
    use crate::sync::LoopbackServer;

    type Session = BoardSession<LoopbackServer, LoopbackServer>;

    async fn open(layout: &[(&str, &[&str])]) -> (Session, LoopbackServer, BoardId) {
        let server = LoopbackServer::new();
        let snap = board(layout);
        let id = snap.id.clone();
        server.insert_board(snap);

        let mut session = BoardSession::new(Arc::new(server.clone()), server.clone(), Config::default());
        session.open_board(&id).await.unwrap();
        (session, server, id)
    }

    #[tokio::test]
    async fn commands_without_board_fail() {
        let server = LoopbackServer::new();
        let mut session: Session = BoardSession::new(Arc::new(server.clone()), server, Config::default());

        let err = session.create_list("Todo").unwrap_err();
        assert_eq!(err, BoardError::Validation(ValidationError::NoActiveBoard));
        assert!(session.snapshot().is_none());
    }

    #[tokio::test]
    async fn mutation_is_pushed() {
        let (mut session, server, id) = open(&[("L1", &["A"])]).await;

        let task = session.create_task(&lid("L1"), "Write docs").unwrap();
        let updates = session.settle().await;

        assert!(matches!(updates[0], SessionUpdate::PushCompleted { ok: true, .. }));
        assert!(server.board(&id).unwrap().task(&task).is_some());
        assert_eq!(session.sync_state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn noop_move_queues_no_push() {
        let (mut session, server, _) = open(&[("L1", &["A", "B"])]).await;

        let moved = session
            .move_item(&MoveCommand::TaskMove {
                source_list: lid("L1"),
                dest_list: lid("L1"),
                source_index: 1,
                dest_index: 1,
            })
            .unwrap();

        assert!(!moved);
        assert!(session.settle().await.is_empty());
        assert!(server.pushes().is_empty());
    }

    #[tokio::test]
    async fn push_disabled_by_config() {
        let server = LoopbackServer::new();
        let snap = board(&[("L1", &[])]);
        let id = snap.id.clone();
        server.insert_board(snap);

        let mut config = Config::default();
        config.sync.push_on_mutation = false;
        let mut session = BoardSession::new(Arc::new(server.clone()), server.clone(), config);
        session.open_board(&id).await.unwrap();

        session.create_list("Local only").unwrap();
        assert!(session.settle().await.is_empty());
        assert!(server.pushes().is_empty());
    }

    #[tokio::test]
    async fn filter_is_memoized_per_snapshot() {
        let (mut session, _server, _) = open(&[("L1", &["A", "B"])]).await;
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        let view = session.filter_on(&FilterCriteria::default(), today).unwrap();
        assert_eq!(view.total(), 2);

        session.delete_task(&tid("A")).unwrap();
        let view = session.filter_on(&FilterCriteria::default(), today).unwrap();
        assert_eq!(view.total(), 1);
        assert_eq!(session.due_soon().due_within_days, Some(7));
    }

    #[tokio::test]
    async fn fetch_failure_is_sync_error() {
        let server = LoopbackServer::new();
        let mut session: Session = BoardSession::new(Arc::new(server.clone()), server, Config::default());

        let err = session.open_board(&"missing".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, BoardError::Sync(SyncError::Fetch { .. })));
        assert!(session.snapshot().is_none());
    }

    struct ClosedChannel;

    impl LiveChannel for ClosedChannel {
        fn subscribe(&self, _board_id: &BoardId, _sink: InboundSink) -> Result<Subscription, RemoteError> {
            Err(RemoteError::Unavailable("socket down".to_string()))
        }
    }

    #[tokio::test]
    async fn board_opens_without_live_channel() {
        let server = LoopbackServer::new();
        let snap = board(&[("L1", &["A"])]);
        let id = snap.id.clone();
        server.insert_board(snap);

        let mut session = BoardSession::new(Arc::new(server), ClosedChannel, Config::default());
        let current = session.open_board(&id).await.unwrap();

        assert_eq!(current.tasks.len(), 1);
        assert!(!session.has_live_channel());
        let notices = session.take_notices();
        match notices.as_slice() {
            [SyncNotice::ChannelUnavailable {
                board_id,
                error: SyncError::Channel { reason, .. },
            }] => {
                assert_eq!(*board_id, id);
                assert!(reason.contains("socket down"));
            }
            other => panic!("expected a channel notice, got {:?}", other),
        }
    }

    /// Fetches from the loopback server; every push panics
    struct PanickingPush(LoopbackServer);

    impl BoardTransport for PanickingPush {
        async fn fetch_board(&self, board_id: &BoardId) -> Result<BoardSnapshot, RemoteError> {
            self.0.fetch_board(board_id).await
        }

        async fn push_board(&self, _snapshot: Arc<BoardSnapshot>) -> Result<(), RemoteError> {
            panic!("push handler crashed")
        }
    }

    #[tokio::test]
    async fn panicked_push_still_settles() {
        let server = LoopbackServer::new();
        let snap = board(&[("L1", &[])]);
        let id = snap.id.clone();
        server.insert_board(snap);

        let mut session = BoardSession::new(
            Arc::new(PanickingPush(server.clone())),
            server.clone(),
            Config::default(),
        );
        session.open_board(&id).await.unwrap();
        session.create_list("Done").unwrap();

        let updates = tokio::time::timeout(std::time::Duration::from_secs(5), session.settle())
            .await
            .expect("settle waits on a push that will never report");

        assert!(matches!(updates.as_slice(), [SessionUpdate::PushCompleted { ok: false, .. }]));
        assert!(matches!(session.take_notices().as_slice(), [SyncNotice::PushFailed { .. }]));
        assert_eq!(session.sync_state(), SyncState::Idle);
        assert_eq!(session.snapshot().unwrap().list_ids.len(), 2);
        assert!(server.pushes().is_empty());
    }
}
