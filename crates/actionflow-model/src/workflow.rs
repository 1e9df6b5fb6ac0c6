use serde::{Deserialize, Serialize};

use crate::action::ActionRecord;
use crate::ids::WorkflowId;
use crate::trigger::TriggerRecord;

/// A workflow as returned by the remote store.
///
/// A draft that has not been created yet has no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<WorkflowId>,
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// External reference of the workflow in the store.
  #[serde(default)]
  pub store_ref: String,
  #[serde(default)]
  pub folder_id: Option<u64>,
  /// Editable trigger settings sent with workflow writes.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger: Option<serde_json::Value>,
  #[serde(default)]
  pub triggers: Vec<TriggerRecord>,
  #[serde(default)]
  pub actions: Vec<ActionRecord>,
  #[serde(default)]
  pub actions_count: u32,
}

impl WorkflowRecord {
  /// An unsaved workflow with default settings.
  pub fn draft() -> Self {
    Self {
      id: None,
      name: "new workflow".to_string(),
      description: String::new(),
      store_ref: String::new(),
      folder_id: None,
      trigger: None,
      triggers: Vec::new(),
      actions: Vec::new(),
      actions_count: 0,
    }
  }
}

/// The editable subset of a workflow sent on create and update.
///
/// Triggers and actions are never embedded in a workflow write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPayload {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub store_ref: String,
  #[serde(default)]
  pub trigger: Option<serde_json::Value>,
}

impl From<&WorkflowRecord> for WorkflowPayload {
  fn from(record: &WorkflowRecord) -> Self {
    Self {
      name: record.name.clone(),
      description: record.description.clone(),
      store_ref: record.store_ref.clone(),
      trigger: record.trigger.clone(),
    }
  }
}

/// Relations the store should embed or count when listing workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowQuery {
  pub with: Vec<String>,
  pub with_count: Vec<String>,
}

impl Default for WorkflowQuery {
  fn default() -> Self {
    Self {
      with: vec!["triggers.trigger.app".to_string()],
      with_count: vec!["actions".to_string()],
    }
  }
}

impl WorkflowQuery {
  /// Query-string pairs, one `with`/`with_count` entry per relation list.
  pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if !self.with.is_empty() {
      pairs.push(("with", self.with.join(",")));
    }
    if !self.with_count.is_empty() {
      pairs.push(("with_count", self.with_count.join(",")));
    }
    pairs
  }
}
