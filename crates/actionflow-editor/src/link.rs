//! `on_success` linking between sibling actions.

use actionflow_graph::{GraphError, Scope};
use actionflow_model::{ActionId, ActionPayload, ActionRecord, WorkflowId};
use tracing::{debug, info, instrument};

use crate::error::SyncError;
use crate::session::SessionToken;
use crate::sync::{Reconciled, SyncCoordinator, Ticket, accept};

/// Points an action's `on_success` at a sibling in the same scope.
pub struct LinkManager<'a> {
  coordinator: &'a SyncCoordinator,
}

impl<'a> LinkManager<'a> {
  pub fn new(coordinator: &'a SyncCoordinator) -> Self {
    Self { coordinator }
  }

  /// Make `target_id` continue into `new_node`.
  ///
  /// `new_node` must already be in the graph, and the target must sit in
  /// the scope the graph holds it in. Either miss fails with `NodeNotFound`
  /// before anything is sent. An existing successor of the target is
  /// replaced.
  #[instrument(skip_all, fields(action_id = %new_node.id, target_id = %target_id))]
  pub async fn link(
    &self,
    new_node: &ActionRecord,
    target_id: ActionId,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    self.link_as(new_node, target_id, None).await
  }

  pub(crate) async fn link_as(
    &self,
    new_node: &ActionRecord,
    target_id: ActionId,
    session: Option<SessionToken>,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    let (ticket, workflow_id) = self.coordinator.ticket(session)?;

    let (payload, previous) = self.coordinator.read_graph(|graph| {
      // The graph's copy decides the scope; the caller's record may be stale.
      let located = graph.locate(new_node.id)?;
      let scope = located.scope;
      if let Scope::Children(parent_id) = scope {
        graph
          .locate(parent_id)
          .map_err(|_| GraphError::ParentNotFound(parent_id))?;
      }
      if new_node.parent_id != scope.parent_id() {
        debug!(
          action_id = %new_node.id,
          "record names a different parent, linking in its current scope"
        );
      }
      let target = graph.find_in_scope(scope, target_id)?;
      let record = target.node.record();
      let payload = ActionPayload::from(record).with_on_success(Some(new_node.id));
      Ok((payload, record.on_success))
    })?;

    if let Some(previous) = previous
      && previous != new_node.id
    {
      info!(%previous, "replacing existing successor");
    }

    self
      .point(ticket, workflow_id, target_id, &payload, "link")
      .await
  }

  /// Clear the `on_success` edge of `target_id`.
  #[instrument(skip_all, fields(target_id = %target_id))]
  pub async fn unlink(&self, target_id: ActionId) -> Result<Reconciled<ActionRecord>, SyncError> {
    let (ticket, workflow_id) = self.coordinator.ticket(None)?;
    let payload = self.coordinator.read_graph(|graph| {
      let target = graph.locate(target_id)?;
      Ok(ActionPayload::from(target.node.record()).with_on_success(None))
    })?;

    self
      .point(ticket, workflow_id, target_id, &payload, "unlink")
      .await
  }

  async fn point(
    &self,
    ticket: Ticket,
    workflow_id: WorkflowId,
    target_id: ActionId,
    payload: &ActionPayload,
    operation: &'static str,
  ) -> Result<Reconciled<ActionRecord>, SyncError> {
    debug!(workflow_id = %workflow_id, next = ?payload.on_success, "updating successor");
    let response = self
      .coordinator
      .remote()
      .update_action(workflow_id, target_id, payload)
      .await;
    let record = accept(operation, response)?;

    self.coordinator.reconcile(&ticket, operation, |graph| {
      graph.replace(record.clone())?;
      info!(next = ?record.on_success, "successor updated");
      Ok(record)
    })
  }
}
