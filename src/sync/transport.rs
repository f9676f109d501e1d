//! Fetch/push collaborator

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::{BoardId, BoardSnapshot};

/// Failure reported by a remote collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("board not found: {0}")]
    NotFound(BoardId),
}

/// Loads and stores whole board snapshots.
///
/// Pushes always carry the full snapshot; there are no partial patches.
pub trait BoardTransport: Send + Sync + 'static {
    fn fetch_board(
        &self,
        board_id: &BoardId,
    ) -> impl Future<Output = Result<BoardSnapshot, RemoteError>> + Send;

    fn push_board(
        &self,
        snapshot: Arc<BoardSnapshot>,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
