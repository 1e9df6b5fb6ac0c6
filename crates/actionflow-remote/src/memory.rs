use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use actionflow_model::{
  ActionId, ActionPayload, ActionRecord, Connection, Envelope, TriggerId, TriggerPayload,
  TriggerRecord, WorkflowId, WorkflowPayload, WorkflowQuery, WorkflowRecord,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::RemoteStore;
use crate::error::RemoteError;

/// The store operations, used to script faults and inspect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  ListWorkflows,
  CreateWorkflow,
  UpdateWorkflow,
  DeleteWorkflow,
  ListActions,
  CreateAction,
  UpdateAction,
  DeleteAction,
  CreateTrigger,
  UpdateTrigger,
  ListConnections,
}

/// A scripted failure for the next call of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
  /// Answer with `success: false` and this message.
  Reject(String),
  /// Fail before any envelope is produced.
  Transport(String),
}

impl Fault {
  fn respond<T>(self) -> Result<Envelope<T>, RemoteError> {
    match self {
      Fault::Reject(message) => Ok(Envelope::rejected(message)),
      Fault::Transport(message) => Err(RemoteError::Unavailable(message)),
    }
  }
}

/// A call received by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
  pub operation: Operation,
  /// Id of the addressed record, if any.
  pub target: Option<u64>,
}

/// Holds the next call of an operation until released.
///
/// The held call is recorded and has entered the store, but its response is
/// not produced until [`Hold::release`].
#[derive(Debug, Clone, Default)]
pub struct Hold {
  entered: Arc<Notify>,
  release: Arc<Notify>,
}

impl Hold {
  /// Wait until the held call has reached the store.
  pub async fn entered(&self) {
    self.entered.notified().await
  }

  /// Let the held call produce its response.
  pub fn release(&self) {
    self.release.notify_one();
  }
}

#[derive(Default)]
struct State {
  next_workflow: u64,
  next_action: u64,
  next_trigger: u64,
  /// Workflows with their triggers; actions live in `actions`.
  workflows: BTreeMap<WorkflowId, WorkflowRecord>,
  /// All actions, flat, with `workflow_id` set.
  actions: BTreeMap<ActionId, ActionRecord>,
  connections: Vec<Connection>,
  faults: HashMap<Operation, VecDeque<Fault>>,
  holds: HashMap<Operation, Hold>,
  calls: Vec<RemoteCall>,
}

/// In-process remote store.
///
/// Assigns ids, keeps nesting and links consistent the way the real store
/// does, and embeds provider detail objects in returned records.
#[derive(Default)]
pub struct MemoryRemoteStore {
  state: Mutex<State>,
}

impl MemoryRemoteStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_connections(connections: Vec<Connection>) -> Self {
    let store = Self::default();
    store.lock().connections = connections;
    store
  }

  /// Make the next call of `operation` fail with `fault`.
  ///
  /// Faults queue up per operation and are consumed in order.
  pub fn fail_next(&self, operation: Operation, fault: Fault) {
    self
      .lock()
      .faults
      .entry(operation)
      .or_default()
      .push_back(fault);
  }

  /// Hold the next call of `operation` until the returned handle releases it.
  pub fn hold(&self, operation: Operation) -> Hold {
    let hold = Hold::default();
    self.lock().holds.insert(operation, hold.clone());
    hold
  }

  /// Every call received so far, in order.
  pub fn calls(&self) -> Vec<RemoteCall> {
    self.lock().calls.clone()
  }

  /// Number of calls received for `operation`.
  pub fn calls_to(&self, operation: Operation) -> usize {
    self
      .lock()
      .calls
      .iter()
      .filter(|call| call.operation == operation)
      .count()
  }

  /// The store's current copy of an action.
  pub fn action(&self, action_id: ActionId) -> Option<ActionRecord> {
    let state = self.lock();
    state
      .actions
      .get(&action_id)
      .map(|action| state.with_count(action.clone()))
  }

  /// The store's current copy of a workflow (without actions).
  pub fn workflow(&self, workflow_id: WorkflowId) -> Option<WorkflowRecord> {
    self.lock().workflows.get(&workflow_id).cloned()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Record the call, wait out a hold, and take the next scripted fault.
  async fn enter(&self, operation: Operation, target: Option<u64>) -> Option<Fault> {
    let hold = {
      let mut state = self.lock();
      state.calls.push(RemoteCall { operation, target });
      state.holds.remove(&operation)
    };

    if let Some(hold) = hold {
      hold.entered.notify_one();
      hold.release.notified().await;
    }

    self
      .lock()
      .faults
      .get_mut(&operation)
      .and_then(VecDeque::pop_front)
  }
}

impl State {
  fn with_count(&self, mut action: ActionRecord) -> ActionRecord {
    action.actions_count = self
      .actions
      .values()
      .filter(|child| child.parent_id == Some(action.id))
      .count() as u32;
    action
  }

  fn workflow_with_count(&self, mut workflow: WorkflowRecord) -> WorkflowRecord {
    workflow.actions_count = self
      .actions
      .values()
      .filter(|action| action.workflow_id == workflow.id)
      .count() as u32;
    workflow
  }

  fn tree(&self, workflow_id: WorkflowId, parent_id: Option<ActionId>) -> Vec<ActionRecord> {
    self
      .actions
      .values()
      .filter(|action| action.workflow_id == Some(workflow_id) && action.parent_id == parent_id)
      .map(|action| {
        let mut record = self.with_count(action.clone());
        record.actions = self.tree(workflow_id, Some(action.id));
        record
      })
      .collect()
  }

  /// Validate nesting and linking the way the store does.
  fn check_action(
    &self,
    workflow_id: WorkflowId,
    action_id: Option<ActionId>,
    payload: &ActionPayload,
  ) -> Result<(), String> {
    if let Some(parent_id) = payload.parent_id {
      match self.actions.get(&parent_id) {
        Some(parent) if parent.workflow_id == Some(workflow_id) => {}
        _ => return Err(format!("parent action {parent_id} not found")),
      }
      if Some(parent_id) == action_id {
        return Err("an action cannot contain itself".to_string());
      }
    }

    if let Some(next) = payload.on_success {
      match self.actions.get(&next) {
        Some(target)
          if target.workflow_id == Some(workflow_id) && target.parent_id == payload.parent_id => {}
        _ => return Err(format!("on_success action {next} is not a sibling")),
      }
      if Some(next) == action_id {
        return Err("an action cannot follow itself".to_string());
      }
    }

    Ok(())
  }
}

fn detail(kind: &str, type_id: u64, provider_id: u64) -> serde_json::Value {
  json!({
    "id": provider_id,
    "type_id": type_id,
    "kind": kind,
    "app": { "id": provider_id }
  })
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
  async fn list_workflows(
    &self,
    query: &WorkflowQuery,
  ) -> Result<Envelope<Vec<WorkflowRecord>>, RemoteError> {
    if let Some(fault) = self.enter(Operation::ListWorkflows, None).await {
      return fault.respond();
    }

    let embed_triggers = query.with.iter().any(|w| w.starts_with("triggers"));
    let state = self.lock();
    let workflows = state
      .workflows
      .values()
      .cloned()
      .map(|mut workflow| {
        if !embed_triggers {
          workflow.triggers.clear();
        }
        state.workflow_with_count(workflow)
      })
      .collect();
    Ok(Envelope::ok(workflows))
  }

  async fn create_workflow(
    &self,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError> {
    if let Some(fault) = self.enter(Operation::CreateWorkflow, None).await {
      return fault.respond();
    }
    if payload.name.trim().is_empty() {
      return Ok(Envelope::rejected("The name field is required."));
    }

    let mut state = self.lock();
    state.next_workflow += 1;
    let id = WorkflowId(state.next_workflow);
    let workflow = WorkflowRecord {
      id: Some(id),
      name: payload.name.clone(),
      description: payload.description.clone(),
      store_ref: payload.store_ref.clone(),
      folder_id: None,
      trigger: payload.trigger.clone(),
      triggers: Vec::new(),
      actions: Vec::new(),
      actions_count: 0,
    };
    state.workflows.insert(id, workflow.clone());
    Ok(Envelope::ok(workflow))
  }

  async fn update_workflow(
    &self,
    workflow_id: WorkflowId,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError> {
    if let Some(fault) = self
      .enter(Operation::UpdateWorkflow, Some(workflow_id.0))
      .await
    {
      return fault.respond();
    }
    if payload.name.trim().is_empty() {
      return Ok(Envelope::rejected("The name field is required."));
    }

    let mut state = self.lock();
    let Some(workflow) = state.workflows.get_mut(&workflow_id) else {
      return Ok(Envelope::rejected(format!("workflow {workflow_id} not found")));
    };
    workflow.name = payload.name.clone();
    workflow.description = payload.description.clone();
    workflow.store_ref = payload.store_ref.clone();
    workflow.trigger = payload.trigger.clone();
    let workflow = workflow.clone();
    Ok(Envelope::ok(state.workflow_with_count(workflow)))
  }

  async fn delete_workflow(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError> {
    if let Some(fault) = self
      .enter(Operation::DeleteWorkflow, Some(workflow_id.0))
      .await
    {
      return fault.respond();
    }

    let mut state = self.lock();
    if state.workflows.remove(&workflow_id).is_none() {
      return Ok(Envelope::rejected(format!("workflow {workflow_id} not found")));
    }
    state
      .actions
      .retain(|_, action| action.workflow_id != Some(workflow_id));
    Ok(Envelope::ok(serde_json::Value::Null))
  }

  async fn list_actions(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<Vec<ActionRecord>>, RemoteError> {
    if let Some(fault) = self
      .enter(Operation::ListActions, Some(workflow_id.0))
      .await
    {
      return fault.respond();
    }

    let state = self.lock();
    if !state.workflows.contains_key(&workflow_id) {
      return Ok(Envelope::rejected(format!("workflow {workflow_id} not found")));
    }
    Ok(Envelope::ok(state.tree(workflow_id, None)))
  }

  async fn create_action(
    &self,
    workflow_id: WorkflowId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError> {
    if let Some(fault) = self.enter(Operation::CreateAction, None).await {
      return fault.respond();
    }

    let mut state = self.lock();
    if !state.workflows.contains_key(&workflow_id) {
      return Ok(Envelope::rejected(format!("workflow {workflow_id} not found")));
    }
    if let Err(message) = state.check_action(workflow_id, None, payload) {
      return Ok(Envelope::rejected(message));
    }

    state.next_action += 1;
    let id = ActionId(state.next_action);
    let action = ActionRecord {
      id,
      workflow_id: Some(workflow_id),
      action_type_id: payload.action_type_id,
      provider_id: payload.provider_id,
      config: payload.config.clone(),
      parent_id: payload.parent_id,
      on_success: payload.on_success,
      actions: Vec::new(),
      actions_count: 0,
      action: Some(detail("action", payload.action_type_id, payload.provider_id)),
    };
    state.actions.insert(id, action.clone());
    Ok(Envelope::ok(action))
  }

  async fn update_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError> {
    if let Some(fault) = self
      .enter(Operation::UpdateAction, Some(action_id.0))
      .await
    {
      return fault.respond();
    }

    let mut state = self.lock();
    match state.actions.get(&action_id) {
      Some(action) if action.workflow_id == Some(workflow_id) => {}
      _ => return Ok(Envelope::rejected(format!("action {action_id} not found"))),
    }
    if let Err(message) = state.check_action(workflow_id, Some(action_id), payload) {
      return Ok(Envelope::rejected(message));
    }

    let Some(action) = state.actions.get_mut(&action_id) else {
      return Ok(Envelope::rejected(format!("action {action_id} not found")));
    };
    action.action_type_id = payload.action_type_id;
    action.provider_id = payload.provider_id;
    action.config = payload.config.clone();
    action.parent_id = payload.parent_id;
    action.on_success = payload.on_success;
    action.action = Some(detail("action", payload.action_type_id, payload.provider_id));
    let action = action.clone();
    Ok(Envelope::ok(state.with_count(action)))
  }

  async fn delete_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError> {
    if let Some(fault) = self
      .enter(Operation::DeleteAction, Some(action_id.0))
      .await
    {
      return fault.respond();
    }

    let mut state = self.lock();
    match state.actions.get(&action_id) {
      Some(action) if action.workflow_id == Some(workflow_id) => {}
      _ => return Ok(Envelope::rejected(format!("action {action_id} not found"))),
    }

    let mut removed = vec![action_id];
    let mut cursor = 0;
    while cursor < removed.len() {
      let parent = removed[cursor];
      removed.extend(
        state
          .actions
          .values()
          .filter(|action| action.parent_id == Some(parent))
          .map(|action| action.id),
      );
      cursor += 1;
    }
    for id in &removed {
      state.actions.remove(id);
    }
    for action in state.actions.values_mut() {
      if action.on_success.is_some_and(|next| removed.contains(&next)) {
        action.on_success = None;
      }
    }

    Ok(Envelope::ok(serde_json::Value::Null))
  }

  async fn create_trigger(
    &self,
    workflow_id: WorkflowId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError> {
    if let Some(fault) = self.enter(Operation::CreateTrigger, None).await {
      return fault.respond();
    }

    let mut state = self.lock();
    state.next_trigger += 1;
    let id = TriggerId(state.next_trigger);
    let Some(workflow) = state.workflows.get_mut(&workflow_id) else {
      return Ok(Envelope::rejected(format!("workflow {workflow_id} not found")));
    };
    let trigger = TriggerRecord {
      id,
      workflow_id: Some(workflow_id),
      trigger_type_id: payload.trigger_type_id,
      provider_id: payload.provider_id,
      config: payload.config.clone(),
      trigger: Some(detail("trigger", payload.trigger_type_id, payload.provider_id)),
    };
    workflow.triggers.push(trigger.clone());
    Ok(Envelope::ok(trigger))
  }

  async fn update_trigger(
    &self,
    workflow_id: WorkflowId,
    trigger_id: TriggerId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError> {
    if let Some(fault) = self
      .enter(Operation::UpdateTrigger, Some(trigger_id.0))
      .await
    {
      return fault.respond();
    }

    let mut state = self.lock();
    let trigger = state
      .workflows
      .get_mut(&workflow_id)
      .and_then(|workflow| workflow.triggers.iter_mut().find(|t| t.id == trigger_id));
    let Some(trigger) = trigger else {
      return Ok(Envelope::rejected(format!("trigger {trigger_id} not found")));
    };
    trigger.trigger_type_id = payload.trigger_type_id;
    trigger.provider_id = payload.provider_id;
    trigger.config = payload.config.clone();
    trigger.trigger = Some(detail("trigger", payload.trigger_type_id, payload.provider_id));
    Ok(Envelope::ok(trigger.clone()))
  }

  async fn list_connections(&self) -> Result<Envelope<Vec<Connection>>, RemoteError> {
    if let Some(fault) = self.enter(Operation::ListConnections, None).await {
      return fault.respond();
    }
    Ok(Envelope::ok(self.lock().connections.clone()))
  }
}
