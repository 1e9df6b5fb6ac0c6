//! Placement of created actions follows the record the store returns.

use std::sync::{Arc, Mutex};

use actionflow_editor::WorkflowEditor;
use actionflow_model::{
  ActionId, ActionPayload, ActionRecord, Connection, Envelope, ITERATION_ACTION_TYPE, TriggerId,
  TriggerPayload, TriggerRecord, WorkflowId, WorkflowPayload, WorkflowQuery, WorkflowRecord,
};
use actionflow_remote::{MemoryRemoteStore, RemoteError, RemoteStore};
use async_trait::async_trait;
use serde_json::json;

/// A store that files root-level creates under a container of its choosing.
struct RelocatingStore {
  inner: MemoryRemoteStore,
  relocate_to: Mutex<Option<ActionId>>,
}

impl RelocatingStore {
  fn new() -> Self {
    Self {
      inner: MemoryRemoteStore::new(),
      relocate_to: Mutex::new(None),
    }
  }

  fn relocate_to(&self, parent_id: ActionId) {
    *self.relocate_to.lock().unwrap() = Some(parent_id);
  }
}

#[async_trait]
impl RemoteStore for RelocatingStore {
  async fn list_workflows(
    &self,
    query: &WorkflowQuery,
  ) -> Result<Envelope<Vec<WorkflowRecord>>, RemoteError> {
    self.inner.list_workflows(query).await
  }

  async fn create_workflow(
    &self,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError> {
    self.inner.create_workflow(payload).await
  }

  async fn update_workflow(
    &self,
    workflow_id: WorkflowId,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError> {
    self.inner.update_workflow(workflow_id, payload).await
  }

  async fn delete_workflow(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError> {
    self.inner.delete_workflow(workflow_id).await
  }

  async fn list_actions(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<Vec<ActionRecord>>, RemoteError> {
    self.inner.list_actions(workflow_id).await
  }

  async fn create_action(
    &self,
    workflow_id: WorkflowId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError> {
    let relocate_to = *self.relocate_to.lock().unwrap();
    match relocate_to {
      Some(parent_id) if payload.parent_id.is_none() => {
        let payload = payload.clone().with_parent(parent_id);
        self.inner.create_action(workflow_id, &payload).await
      }
      _ => self.inner.create_action(workflow_id, payload).await,
    }
  }

  async fn update_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError> {
    self.inner.update_action(workflow_id, action_id, payload).await
  }

  async fn delete_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError> {
    self.inner.delete_action(workflow_id, action_id).await
  }

  async fn create_trigger(
    &self,
    workflow_id: WorkflowId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError> {
    self.inner.create_trigger(workflow_id, payload).await
  }

  async fn update_trigger(
    &self,
    workflow_id: WorkflowId,
    trigger_id: TriggerId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError> {
    self
      .inner
      .update_trigger(workflow_id, trigger_id, payload)
      .await
  }

  async fn list_connections(&self) -> Result<Envelope<Vec<Connection>>, RemoteError> {
    self.inner.list_connections().await
  }
}

fn step() -> ActionPayload {
  ActionPayload::new(2, 1, json!({}))
}

#[tokio::test]
async fn test_created_action_placed_by_returned_parent() {
  let remote = Arc::new(RelocatingStore::new());
  let editor = WorkflowEditor::new(remote.clone());
  let payload = WorkflowPayload {
    name: "orders".to_string(),
    description: String::new(),
    store_ref: String::new(),
    trigger: None,
  };
  let workflow = editor.sync().create_workflow(&payload).await.unwrap();
  editor.edit_workflow(workflow.id.unwrap()).await.unwrap();

  let container = editor
    .sync()
    .create_action(&ActionPayload::new(ITERATION_ACTION_TYPE, 1, json!({})))
    .await
    .unwrap()
    .applied()
    .unwrap()
    .id;

  remote.relocate_to(container);
  let created = editor
    .sync()
    .create_action(&step())
    .await
    .unwrap()
    .applied()
    .unwrap();

  assert_eq!(created.parent_id, Some(container));
  let (roots, children, count) = editor
    .sync()
    .with_graph(|g| {
      let parent = g.node(container).unwrap();
      (
        g.roots().to_vec(),
        parent.children().to_vec(),
        parent.record().actions_count,
      )
    })
    .unwrap();
  assert_eq!(roots, vec![container]);
  assert_eq!(children, vec![created.id]);
  assert_eq!(count, 1);
  editor
    .sync()
    .with_graph(|g| g.validate())
    .unwrap()
    .unwrap();
}
