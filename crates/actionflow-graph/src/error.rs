use actionflow_model::{ActionId, TriggerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("action not found: {0}")]
  NodeNotFound(ActionId),

  #[error("parent action not found: {0}")]
  ParentNotFound(ActionId),

  #[error("trigger not found: {0}")]
  TriggerNotFound(TriggerId),

  #[error("action already present: {0}")]
  DuplicateNode(ActionId),

  #[error("trigger already present: {0}")]
  DuplicateTrigger(TriggerId),

  #[error("on_success link crosses nesting scopes: from={from}, to={to}")]
  CrossScopeLink { from: ActionId, to: ActionId },

  #[error("on_success link references unknown action: from={from}, to={to}")]
  DanglingLink { from: ActionId, to: ActionId },

  #[error("failed to serialize workflow: {0}")]
  Serialize(#[from] serde_json::Error),
}
