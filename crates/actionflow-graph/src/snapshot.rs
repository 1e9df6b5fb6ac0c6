//! Nested views of the graph handed to display collaborators.

use actionflow_model::{ActionId, ActionRecord, WorkflowRecord};

use crate::error::GraphError;
use crate::store::GraphStore;

impl GraphStore {
  /// The full nested workflow, provider details included.
  pub fn to_record(&self) -> WorkflowRecord {
    self.build(false)
  }

  /// A lean, independent copy for display.
  ///
  /// Provider detail objects (`trigger` on triggers, `action` on actions at
  /// every depth) are stripped; only their identifiers remain.
  pub fn snapshot(&self) -> WorkflowRecord {
    self.build(true)
  }

  /// The lean snapshot as two-space indented JSON.
  pub fn pretty(&self) -> Result<String, GraphError> {
    Ok(serde_json::to_string_pretty(&self.snapshot())?)
  }

  fn build(&self, lean: bool) -> WorkflowRecord {
    let mut workflow = self.details().clone();
    workflow.triggers = self
      .triggers()
      .iter()
      .cloned()
      .map(|mut trigger| {
        if lean {
          trigger.trigger = None;
        }
        trigger
      })
      .collect();
    workflow.actions = self.build_scope(self.roots(), lean);
    workflow
  }

  fn build_scope(&self, ids: &[ActionId], lean: bool) -> Vec<ActionRecord> {
    ids
      .iter()
      .filter_map(|id| self.node(*id))
      .map(|node| {
        let mut record = node.record().clone();
        if lean {
          record.action = None;
        }
        record.actions = self.build_scope(node.children(), lean);
        record
      })
      .collect()
  }
}
