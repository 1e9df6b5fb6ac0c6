//! Actionflow Editor
//!
//! This crate drives the editing of one workflow against the remote store.
//!
//! - [`SyncCoordinator`] issues create/update/delete calls for workflows,
//!   triggers and actions and reconciles successful responses into the
//!   bound [`GraphStore`](actionflow_graph::GraphStore)
//! - [`LinkManager`] chains a new action after a sibling via `on_success`
//! - [`EditSession`] is the modal form state machine
//! - [`WorkflowEditor`] ties them together as the single editing context
//!
//! The graph is never changed speculatively. Requests carry the epoch of the
//! graph they were issued for (and the session generation, for form saves);
//! a response that comes back after either has moved on is reported as
//! [`Reconciled::Discarded`] and not applied.

mod editor;
mod error;
mod events;
mod link;
mod session;
mod sync;

pub use editor::{SaveOutcome, WorkflowEditor};
pub use error::{NodeKind, SyncError};
pub use events::{ChannelNotifier, EditorEvent, EditorNotifier, NoopNotifier};
pub use link::LinkManager;
pub use session::{
  EditSession, ExistingNode, ModalKind, ModalRequest, SavePayload, SavePlan, SessionMode,
  SessionState, SessionToken,
};
pub use sync::{Reconciled, SyncCoordinator};
