use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, WorkflowId};

/// Type identifier of the iteration action, whose body is a nested sequence
/// of child actions.
pub const ITERATION_ACTION_TYPE: u64 = 1;

/// An action as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
  pub id: ActionId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_id: Option<WorkflowId>,
  /// Catalog type of the action (e.g. iteration).
  pub action_type_id: u64,
  /// Concrete provider implementing the action type.
  pub provider_id: u64,
  #[serde(default)]
  pub config: serde_json::Value,
  /// Enclosing container action, `None` at the workflow root.
  #[serde(default)]
  pub parent_id: Option<ActionId>,
  /// Next action in the same nesting scope.
  #[serde(default)]
  pub on_success: Option<ActionId>,
  /// Nested body of a container action.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub actions: Vec<ActionRecord>,
  /// Server-maintained number of direct children.
  #[serde(default)]
  pub actions_count: u32,
  /// Provider detail object embedded by the store (catalog entry, app).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub action: Option<serde_json::Value>,
}

impl ActionRecord {
  /// Whether this action holds a nested sequence of child actions.
  pub fn is_container(&self) -> bool {
    self.action_type_id == ITERATION_ACTION_TYPE || !self.actions.is_empty()
  }
}

/// The editable subset of an action sent on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
  pub action_type_id: u64,
  pub provider_id: u64,
  #[serde(default)]
  pub config: serde_json::Value,
  #[serde(default)]
  pub parent_id: Option<ActionId>,
  #[serde(default)]
  pub on_success: Option<ActionId>,
}

impl ActionPayload {
  pub fn new(action_type_id: u64, provider_id: u64, config: serde_json::Value) -> Self {
    Self {
      action_type_id,
      provider_id,
      config,
      parent_id: None,
      on_success: None,
    }
  }

  /// Place the action inside the container `parent_id`.
  pub fn with_parent(mut self, parent_id: ActionId) -> Self {
    self.parent_id = Some(parent_id);
    self
  }

  /// Point the action's forward edge at `next`.
  pub fn with_on_success(mut self, next: Option<ActionId>) -> Self {
    self.on_success = next;
    self
  }
}

impl From<&ActionRecord> for ActionPayload {
  fn from(record: &ActionRecord) -> Self {
    Self {
      action_type_id: record.action_type_id,
      provider_id: record.provider_id,
      config: record.config.clone(),
      parent_id: record.parent_id,
      on_success: record.on_success,
    }
  }
}
