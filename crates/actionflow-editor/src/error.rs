//! Editor error types.

use std::fmt;

use actionflow_graph::GraphError;
use actionflow_model::{ActionId, ActionRecord};
use actionflow_remote::RemoteError;

/// What kind of record an id referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  Workflow,
  Trigger,
  Action,
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeKind::Workflow => write!(f, "workflow"),
      NodeKind::Trigger => write!(f, "trigger"),
      NodeKind::Action => write!(f, "action"),
    }
  }
}

/// Errors that can occur while editing and synchronizing a workflow.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  /// An id did not resolve in the searched scope.
  #[error("{kind} not found: {id}")]
  NodeNotFound { kind: NodeKind, id: u64 },

  /// An action's `parent_id` did not resolve.
  #[error("parent action not found: {0}")]
  ParentNotFound(ActionId),

  /// The store answered with `success: false`.
  #[error("remote store rejected the request: {message}")]
  RemoteRejected { message: String },

  /// No envelope could be obtained from the store.
  #[error("transport failure: {0}")]
  TransportFailure(#[from] RemoteError),

  /// The action was created but linking it behind `target_id` failed.
  #[error("action {} was created but linking it after {target_id} failed: {source}", .action.id)]
  LinkFailed {
    action: Box<ActionRecord>,
    target_id: ActionId,
    source: Box<SyncError>,
  },

  #[error("no workflow is open in the editor")]
  NoWorkflow,

  #[error("the workflow has not been created in the store yet")]
  UnsavedWorkflow,

  /// The store reported success without the record the operation returns.
  #[error("the store accepted {0} but returned no record")]
  EmptyResponse(&'static str),

  #[error("no edit session is open")]
  SessionNotOpen,

  #[error("the edit session is already saving")]
  SaveInProgress,

  #[error("a nested creation needs an existing action to nest under")]
  NestedWithoutParent,

  #[error("{expected} session cannot save a {actual} payload")]
  PayloadMismatch {
    expected: &'static str,
    actual: &'static str,
  },

  #[error(transparent)]
  Graph(GraphError),
}

impl SyncError {
  pub fn action_not_found(id: ActionId) -> Self {
    SyncError::NodeNotFound {
      kind: NodeKind::Action,
      id: id.0,
    }
  }

  /// The store's message for a rejection, if this is one.
  pub fn remote_message(&self) -> Option<&str> {
    match self {
      SyncError::RemoteRejected { message } => Some(message),
      SyncError::LinkFailed { source, .. } => source.remote_message(),
      _ => None,
    }
  }
}

impl From<GraphError> for SyncError {
  fn from(error: GraphError) -> Self {
    match error {
      GraphError::NodeNotFound(id) => SyncError::action_not_found(id),
      GraphError::ParentNotFound(id) => SyncError::ParentNotFound(id),
      GraphError::TriggerNotFound(id) => SyncError::NodeNotFound {
        kind: NodeKind::Trigger,
        id: id.0,
      },
      other => SyncError::Graph(other),
    }
  }
}
