//! Remote synchronization.
//!
//! Every mutation goes to the remote store first. The local graph changes
//! only when a successful response is reconciled, and only if the graph (and
//! the edit session, for modal saves) that issued the request is still live.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use actionflow_graph::{GraphError, GraphStore};
use actionflow_model::{
  ActionId, ActionPayload, ActionRecord, Connection, Envelope, TriggerId, TriggerPayload,
  TriggerRecord, WorkflowId, WorkflowPayload, WorkflowQuery, WorkflowRecord,
};
use actionflow_remote::{RemoteError, RemoteStore};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{NodeKind, SyncError};
use crate::events::{EditorEvent, EditorNotifier, NoopNotifier};
use crate::session::SessionToken;

/// Outcome of reconciling a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled<T> {
  /// The local graph was updated.
  Applied(T),
  /// The graph or session that issued the request is gone; nothing changed.
  Discarded,
}

impl<T> Reconciled<T> {
  pub fn is_applied(&self) -> bool {
    matches!(self, Reconciled::Applied(_))
  }

  pub fn applied(self) -> Option<T> {
    match self {
      Reconciled::Applied(value) => Some(value),
      Reconciled::Discarded => None,
    }
  }
}

/// Identifies the graph (and optionally the session) a request was issued for.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
  epoch: u64,
  session: Option<SessionToken>,
}

impl Ticket {
  fn is_live(&self, graph: Option<&GraphStore>) -> bool {
    let graph_live = graph.is_some_and(|graph| graph.epoch() == self.epoch);
    let session_live = self.session.as_ref().is_none_or(SessionToken::is_live);
    graph_live && session_live
  }
}

#[derive(Debug, Default)]
struct EditorState {
  graph: Option<GraphStore>,
  workflows: Vec<WorkflowRecord>,
  connections: Vec<Connection>,
}

/// Issues remote calls and reconciles their responses into local state.
#[derive(Clone)]
pub struct SyncCoordinator {
  remote: Arc<dyn RemoteStore>,
  state: Arc<Mutex<EditorState>>,
  notifier: Arc<dyn EditorNotifier>,
}

impl SyncCoordinator {
  pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
    Self::with_notifier(remote, Arc::new(NoopNotifier))
  }

  pub fn with_notifier(remote: Arc<dyn RemoteStore>, notifier: Arc<dyn EditorNotifier>) -> Self {
    Self {
      remote,
      state: Arc::new(Mutex::new(EditorState::default())),
      notifier,
    }
  }

  // Workflow family

  /// Replace the local workflow list with the store's.
  #[instrument(skip_all)]
  pub async fn fetch_workflows(&self) -> Result<Vec<WorkflowRecord>, SyncError> {
    debug!("listing workflows");
    let response = self.remote.list_workflows(&WorkflowQuery::default()).await;
    let workflows = accept("list_workflows", response)?;

    self.lock().workflows = workflows.clone();
    info!(count = workflows.len(), "workflow list loaded");
    self.notify(EditorEvent::WorkflowListChanged);
    Ok(workflows)
  }

  #[instrument(skip_all, fields(name = %payload.name))]
  pub async fn create_workflow(&self, payload: &WorkflowPayload) -> Result<WorkflowRecord, SyncError> {
    debug!("creating workflow");
    let response = self.remote.create_workflow(payload).await;
    let record = accept("create_workflow", response)?;

    self.lock().workflows.push(record.clone());
    info!(workflow_id = ?record.id, "workflow created");
    self.notify(EditorEvent::WorkflowListChanged);
    Ok(record)
  }

  /// Update a workflow from the local list. The bound graph takes over the
  /// new settings if it shows that workflow.
  #[instrument(skip_all, fields(workflow_id = %workflow_id))]
  pub async fn update_workflow(
    &self,
    workflow_id: WorkflowId,
    payload: &WorkflowPayload,
  ) -> Result<WorkflowRecord, SyncError> {
    self.listed_workflow(workflow_id)?;
    let ticket = self.lock().graph.as_ref().map(|graph| Ticket {
      epoch: graph.epoch(),
      session: None,
    });

    debug!("updating workflow");
    let response = self.remote.update_workflow(workflow_id, payload).await;
    let record = accept("update_workflow", response)?;

    {
      let mut state = self.lock();
      replace_listed(&mut state.workflows, &record);
      if let Some(ticket) = &ticket
        && ticket.is_live(state.graph.as_ref())
        && let Some(graph) = state.graph.as_mut()
        && graph.workflow_id() == Some(workflow_id)
      {
        graph.merge_details(record.clone());
      }
    }

    info!("workflow updated");
    self.notify(EditorEvent::WorkflowListChanged);
    Ok(record)
  }

  /// Delete a workflow from the local list.
  ///
  /// A workflow that is not listed locally fails with `NodeNotFound` without
  /// contacting the store. Deleting the bound workflow unbinds the graph.
  #[instrument(skip_all, fields(workflow_id = %workflow_id))]
  pub async fn delete_workflow(&self, workflow_id: WorkflowId) -> Result<(), SyncError> {
    self.listed_workflow(workflow_id)?;

    debug!("deleting workflow");
    let response = self.remote.delete_workflow(workflow_id).await;
    acknowledge("delete_workflow", response)?;

    let unbound = {
      let mut state = self.lock();
      state.workflows.retain(|w| w.id != Some(workflow_id));
      let bound = state
        .graph
        .as_ref()
        .is_some_and(|graph| graph.workflow_id() == Some(workflow_id));
      if bound {
        state.graph = None;
      }
      bound
    };

    info!(unbound, "workflow deleted");
    self.notify(EditorEvent::WorkflowListChanged);
    if unbound {
      self.notify(EditorEvent::GraphChanged { workflow_id: None });
    }
    Ok(())
  }

  /// Load a listed workflow's action tree and bind it as the edited graph.
  #[instrument(skip_all, fields(workflow_id = %workflow_id))]
  pub async fn edit_workflow(&self, workflow_id: WorkflowId) -> Result<WorkflowRecord, SyncError> {
    let mut record = self.listed_workflow(workflow_id)?;

    debug!("listing actions");
    let response = self.remote.list_actions(workflow_id).await;
    record.actions = accept("list_actions", response)?;

    let graph = GraphStore::new(record)?;
    let snapshot = graph.snapshot();
    info!(epoch = graph.epoch(), actions = graph.len(), "workflow bound");
    self.lock().graph = Some(graph);
    self.notify(EditorEvent::GraphChanged {
      workflow_id: Some(workflow_id),
    });
    Ok(snapshot)
  }

  /// Bind an unsaved draft workflow.
  pub fn new_workflow(&self) -> Result<(), SyncError> {
    let graph = GraphStore::new(WorkflowRecord::draft())?;
    debug!(epoch = graph.epoch(), "draft workflow bound");
    self.lock().graph = Some(graph);
    self.notify(EditorEvent::GraphChanged { workflow_id: None });
    Ok(())
  }

  /// Unbind the graph. Responses still in flight for it are discarded.
  pub fn reset_workflow(&self) {
    if self.lock().graph.take().is_some() {
      debug!("graph unbound");
      self.notify(EditorEvent::GraphChanged { workflow_id: None });
    }
  }

  /// Apply locally edited settings to the bound workflow.
  pub fn set_details(&self, payload: &WorkflowPayload) -> Result<(), SyncError> {
    let mut state = self.lock();
    let graph = state.graph.as_mut().ok_or(SyncError::NoWorkflow)?;
    graph.set_details(payload);
    Ok(())
  }

  /// Persist the bound workflow's settings: a draft is created, a stored
  /// workflow is updated.
  #[instrument(skip_all)]
  pub async fn save_workflow(&self) -> Result<Reconciled<WorkflowRecord>, SyncError> {
    let (ticket, workflow_id, payload) = {
      let state = self.lock();
      let graph = state.graph.as_ref().ok_or(SyncError::NoWorkflow)?;
      let ticket = Ticket {
        epoch: graph.epoch(),
        session: None,
      };
      (ticket, graph.workflow_id(), WorkflowPayload::from(graph.details()))
    };

    let record = match workflow_id {
      None => self.create_workflow(&payload).await?,
      Some(workflow_id) => {
        debug!(workflow_id = %workflow_id, "updating workflow");
        let response = self.remote.update_workflow(workflow_id, &payload).await;
        let record = accept("update_workflow", response)?;
        replace_listed(&mut self.lock().workflows, &record);
        self.notify(EditorEvent::WorkflowListChanged);
        record
      }
    };

    self.reconcile(&ticket, "save_workflow", |graph| {
      graph.merge_details(record.clone());
      Ok(record)
    })
  }

  // Trigger family

  #[instrument(skip_all)]
  pub async fn create_trigger(
    &self,
    payload: &TriggerPayload,
  ) -> Result<Reconciled<TriggerRecord>, SyncError> {
    self.create_trigger_as(payload, None).await
  }

  pub(crate) async fn create_trigger_as(
    &self,
    payload: &TriggerPayload,
    session: Option<SessionToken>,
  ) -> Result<Reconciled<TriggerRecord>, SyncError> {
    let (ticket, workflow_id) = self.ticket(session)?;

    debug!(workflow_id = %workflow_id, "creating trigger");
    let response = self.remote.create_trigger(workflow_id, payload).await;
    let record = accept("create_trigger", response)?;

    self.reconcile(&ticket, "create_trigger", |graph| {
      graph.insert_trigger(record.clone())?;
      info!(trigger_id = %record.id, "trigger created");
      Ok(record)
    })
  }

  #[instrument(skip_all, fields(trigger_id = %trigger_id))]
  pub async fn update_trigger(
    &self,
    trigger_id: TriggerId,
    payload: &TriggerPayload,
  ) -> Result<Reconciled<TriggerRecord>, SyncError> {
    self.update_trigger_as(trigger_id, payload, None).await
  }

  pub(crate) async fn update_trigger_as(
    &self,
    trigger_id: TriggerId,
    payload: &TriggerPayload,
    session: Option<SessionToken>,
  ) -> Result<Reconciled<TriggerRecord>, SyncError> {
    let (ticket, workflow_id) = self.ticket(session)?;
    self.read_graph(|graph| graph.locate_trigger(trigger_id))?;

    debug!(workflow_id = %workflow_id, "updating trigger");
    let response = self
      .remote
      .update_trigger(workflow_id, trigger_id, payload)
      .await;
    let record = accept("update_trigger", response)?;

    self.reconcile(&ticket, "update_trigger", |graph| {
      graph.replace_trigger(record.clone())?;
      info!(trigger_id = %record.id, "trigger updated");
      Ok(record)
    })
  }

  // Action family

  /// Create an action. It lands in the scope named by the returned record's
  /// `parent_id`.
  #[instrument(skip_all, fields(parent_id = ?payload.parent_id))]
  pub async fn create_action(
    &self,
    payload: &ActionPayload,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    self.create_action_as(payload, None).await
  }

  pub(crate) async fn create_action_as(
    &self,
    payload: &ActionPayload,
    session: Option<SessionToken>,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    let (ticket, workflow_id) = self.ticket(session)?;
    if let Some(parent_id) = payload.parent_id {
      self
        .read_graph(|graph| graph.locate(parent_id).map(|_| ()))
        .map_err(|e| match e {
          SyncError::NodeNotFound { .. } => SyncError::ParentNotFound(parent_id),
          other => other,
        })?;
    }

    debug!(workflow_id = %workflow_id, "creating action");
    let response = self.remote.create_action(workflow_id, payload).await;
    let record = accept("create_action", response)?;

    self.reconcile(&ticket, "create_action", |graph| {
      let (scope, index) = graph.insert(record.clone())?;
      info!(action_id = %record.id, ?scope, index, "action created");
      Ok(record)
    })
  }

  /// Update an action; it keeps its position and children.
  #[instrument(skip_all, fields(action_id = %action_id))]
  pub async fn update_action(
    &self,
    action_id: ActionId,
    payload: &ActionPayload,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    self.update_action_as(action_id, payload, None).await
  }

  pub(crate) async fn update_action_as(
    &self,
    action_id: ActionId,
    payload: &ActionPayload,
    session: Option<SessionToken>,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    let (ticket, workflow_id) = self.ticket(session)?;
    self.read_graph(|graph| graph.locate(action_id).map(|_| ()))?;

    debug!(workflow_id = %workflow_id, "updating action");
    let response = self
      .remote
      .update_action(workflow_id, action_id, payload)
      .await;
    let record = accept("update_action", response)?;

    self.reconcile(&ticket, "update_action", |graph| {
      let (scope, index) = graph.replace(record.clone())?;
      info!(action_id = %record.id, ?scope, index, "action updated");
      Ok(record)
    })
  }

  /// Delete an action (with the body of a container) and clear links to it
  /// within its own scope.
  #[instrument(skip_all, fields(action_id = %action_id))]
  pub async fn delete_action(&self, action_id: ActionId) -> Result<Reconciled<ActionId>, SyncError> {
    let (ticket, workflow_id) = self.ticket(None)?;
    self.read_graph(|graph| graph.locate(action_id).map(|_| ()))?;

    debug!(workflow_id = %workflow_id, "deleting action");
    let response = self.remote.delete_action(workflow_id, action_id).await;
    acknowledge("delete_action", response)?;

    self.reconcile(&ticket, "delete_action", |graph| {
      let removed = graph.remove(action_id)?;
      info!(
        scope = ?removed.scope,
        unlinked = removed.unlinked.len(),
        descendants = removed.descendants.len(),
        "action deleted"
      );
      Ok(action_id)
    })
  }

  // Connections

  #[instrument(skip_all)]
  pub async fn fetch_connections(&self) -> Result<Vec<Connection>, SyncError> {
    debug!("listing connections");
    let response = self.remote.list_connections().await;
    let connections = accept("list_connections", response)?;
    info!(count = connections.len(), "connections loaded");
    self.lock().connections = connections.clone();
    Ok(connections)
  }

  /// Loaded connections for one provider driver.
  pub fn connections_by_driver(&self, driver: &str) -> Vec<Connection> {
    self
      .lock()
      .connections
      .iter()
      .filter(|connection| connection.driver == driver)
      .cloned()
      .collect()
  }

  // Reads

  pub fn workflows(&self) -> Vec<WorkflowRecord> {
    self.lock().workflows.clone()
  }

  pub fn connections(&self) -> Vec<Connection> {
    self.lock().connections.clone()
  }

  pub fn is_bound(&self) -> bool {
    self.lock().graph.is_some()
  }

  /// Independent copy of the bound workflow for display.
  pub fn snapshot(&self) -> Option<WorkflowRecord> {
    self.lock().graph.as_ref().map(GraphStore::snapshot)
  }

  /// Two-space indented JSON of the bound workflow.
  pub fn pretty_workflow(&self) -> Result<String, SyncError> {
    let state = self.lock();
    let graph = state.graph.as_ref().ok_or(SyncError::NoWorkflow)?;
    Ok(graph.pretty()?)
  }

  /// Run `f` against the bound graph.
  pub fn with_graph<R>(&self, f: impl FnOnce(&GraphStore) -> R) -> Option<R> {
    self.lock().graph.as_ref().map(f)
  }

  // Internals shared with the link manager

  pub(crate) fn remote(&self) -> &dyn RemoteStore {
    self.remote.as_ref()
  }

  pub(crate) fn notify(&self, event: EditorEvent) {
    self.notifier.notify(event);
  }

  /// Ticket for the bound graph plus the id of its stored workflow.
  pub(crate) fn ticket(
    &self,
    session: Option<SessionToken>,
  ) -> Result<(Ticket, WorkflowId), SyncError> {
    let state = self.lock();
    let graph = state.graph.as_ref().ok_or(SyncError::NoWorkflow)?;
    let workflow_id = graph.workflow_id().ok_or(SyncError::UnsavedWorkflow)?;
    let ticket = Ticket {
      epoch: graph.epoch(),
      session,
    };
    Ok((ticket, workflow_id))
  }

  /// Run a read against the bound graph, mapping graph errors.
  pub(crate) fn read_graph<R>(
    &self,
    f: impl FnOnce(&GraphStore) -> Result<R, GraphError>,
  ) -> Result<R, SyncError> {
    let state = self.lock();
    let graph = state.graph.as_ref().ok_or(SyncError::NoWorkflow)?;
    Ok(f(graph)?)
  }

  /// Apply a successful response to the graph if `ticket` is still live.
  pub(crate) fn reconcile<T>(
    &self,
    ticket: &Ticket,
    operation: &'static str,
    apply: impl FnOnce(&mut GraphStore) -> Result<T, GraphError>,
  ) -> Result<Reconciled<T>, SyncError> {
    let (value, workflow_id) = {
      let mut state = self.lock();
      if !ticket.is_live(state.graph.as_ref()) {
        drop(state);
        warn!(operation, "response is stale, discarding");
        self.notify(EditorEvent::ResponseDiscarded {
          operation: operation.to_string(),
        });
        return Ok(Reconciled::Discarded);
      }
      let Some(graph) = state.graph.as_mut() else {
        return Ok(Reconciled::Discarded);
      };
      (apply(graph)?, graph.workflow_id())
    };

    self.notify(EditorEvent::GraphChanged { workflow_id });
    Ok(Reconciled::Applied(value))
  }

  fn listed_workflow(&self, workflow_id: WorkflowId) -> Result<WorkflowRecord, SyncError> {
    self
      .lock()
      .workflows
      .iter()
      .find(|w| w.id == Some(workflow_id))
      .cloned()
      .ok_or(SyncError::NodeNotFound {
        kind: NodeKind::Workflow,
        id: workflow_id.0,
      })
  }

  fn lock(&self) -> MutexGuard<'_, EditorState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

fn replace_listed(workflows: &mut [WorkflowRecord], record: &WorkflowRecord) {
  if let Some(entry) = workflows.iter_mut().find(|w| w.id == record.id) {
    *entry = record.clone();
  }
}

/// Unwrap a response that must carry data.
pub(crate) fn accept<T>(
  operation: &'static str,
  response: Result<Envelope<T>, RemoteError>,
) -> Result<T, SyncError> {
  acknowledge(operation, response)?.ok_or(SyncError::EmptyResponse(operation))
}

/// Unwrap a response whose data, if any, is not needed.
pub(crate) fn acknowledge<T>(
  operation: &'static str,
  response: Result<Envelope<T>, RemoteError>,
) -> Result<Option<T>, SyncError> {
  let envelope = response.map_err(|e| {
    error!(operation, error = %e, "remote call failed");
    SyncError::TransportFailure(e)
  })?;

  envelope.into_result().map_err(|message| {
    warn!(operation, %message, "remote store rejected the request");
    SyncError::RemoteRejected { message }
  })
}
