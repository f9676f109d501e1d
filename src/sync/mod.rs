//! Synchronization with the remote side
//!
//! Collaborator traits ([`BoardTransport`], [`LiveChannel`]), an in-memory
//! implementation of both ([`LoopbackServer`]) and the reconciler that
//! decides what inbound payloads and push results do to the store.

mod channel;
mod loopback;
mod reconciler;
mod transport;

pub(crate) use channel::{PushReport, SessionEvent};
pub use channel::{InboundSink, LiveChannel, Subscription};
pub use loopback::LoopbackServer;
pub use reconciler::{
    IgnoreReason, OutboundPush, ReconcileOutcome, SyncNotice, SyncReconciler, SyncState,
};
pub use transport::{BoardTransport, RemoteError};
