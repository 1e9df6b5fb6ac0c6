//! Editor events and notifiers.
//!
//! Events tell the display collaborator when to re-render from a fresh
//! snapshot. They carry ids only; the state itself is read back from the
//! editor.

use actionflow_model::WorkflowId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::session::ModalKind;

/// Events emitted while editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditorEvent {
  /// The bound graph changed (reconciled response, load or reset).
  GraphChanged { workflow_id: Option<WorkflowId> },

  /// The local workflow list changed.
  WorkflowListChanged,

  /// A modal edit session was opened.
  SessionOpened { kind: ModalKind },

  /// The edit session returned to idle.
  SessionClosed,

  /// A response arrived for a session or graph that is no longer live and
  /// was not applied.
  ResponseDiscarded { operation: String },
}

/// Trait for receiving editor events.
pub trait EditorNotifier: Send + Sync {
  fn notify(&self, event: EditorEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EditorNotifier for NoopNotifier {
  fn notify(&self, _event: EditorEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<EditorEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<EditorEvent>) -> Self {
    Self { sender }
  }
}

impl EditorNotifier for ChannelNotifier {
  fn notify(&self, event: EditorEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
