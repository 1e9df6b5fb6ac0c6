use serde::{Deserialize, Serialize};

use crate::ids::{TriggerId, WorkflowId};

/// A trigger as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
  pub id: TriggerId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_id: Option<WorkflowId>,
  pub trigger_type_id: u64,
  pub provider_id: u64,
  #[serde(default)]
  pub config: serde_json::Value,
  /// Provider detail object embedded by the store.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger: Option<serde_json::Value>,
}

/// The editable subset of a trigger sent on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
  pub trigger_type_id: u64,
  pub provider_id: u64,
  #[serde(default)]
  pub config: serde_json::Value,
}

impl TriggerPayload {
  pub fn new(trigger_type_id: u64, provider_id: u64, config: serde_json::Value) -> Self {
    Self {
      trigger_type_id,
      provider_id,
      config,
    }
  }
}

impl From<&TriggerRecord> for TriggerPayload {
  fn from(record: &TriggerRecord) -> Self {
    Self {
      trigger_type_id: record.trigger_type_id,
      provider_id: record.provider_id,
      config: record.config.clone(),
    }
  }
}
