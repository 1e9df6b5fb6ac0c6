use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use actionflow_model::{
  ActionId, ActionRecord, TriggerRecord, WorkflowId, WorkflowPayload, WorkflowRecord,
};
use actionflow_remote::RemoteStore;
use tracing::{debug, info, instrument, warn};

use crate::error::SyncError;
use crate::events::{EditorEvent, EditorNotifier, NoopNotifier};
use crate::link::LinkManager;
use crate::session::{
  EditSession, ExistingNode, ModalRequest, SavePayload, SavePlan, SessionState, SessionToken,
};
use crate::sync::{Reconciled, SyncCoordinator};

/// What a modal save did.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
  ActionCreated {
    action: ActionRecord,
    /// Set when the action was linked after this sibling.
    linked_after: Option<ActionId>,
  },
  ActionUpdated(ActionRecord),
  TriggerCreated(TriggerRecord),
  TriggerUpdated(TriggerRecord),
  /// The session was closed or replaced before the response arrived.
  Discarded,
}

/// Editing context for one workflow at a time.
///
/// Owns the synchronized workflow state and the modal edit session. Cloning
/// shares both.
#[derive(Clone)]
pub struct WorkflowEditor {
  sync: SyncCoordinator,
  session: Arc<Mutex<EditSession>>,
}

impl WorkflowEditor {
  pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
    Self::with_notifier(remote, Arc::new(NoopNotifier))
  }

  pub fn with_notifier(remote: Arc<dyn RemoteStore>, notifier: Arc<dyn EditorNotifier>) -> Self {
    Self {
      sync: SyncCoordinator::with_notifier(remote, notifier),
      session: Arc::new(Mutex::new(EditSession::new())),
    }
  }

  /// Direct CRUD entry points.
  pub fn sync(&self) -> &SyncCoordinator {
    &self.sync
  }

  pub fn links(&self) -> LinkManager<'_> {
    LinkManager::new(&self.sync)
  }

  // Workflow lifecycle

  pub async fn fetch_workflows(&self) -> Result<Vec<WorkflowRecord>, SyncError> {
    self.sync.fetch_workflows().await
  }

  /// Bind a listed workflow for editing, closing any open form.
  pub async fn edit_workflow(&self, workflow_id: WorkflowId) -> Result<WorkflowRecord, SyncError> {
    self.close_modal();
    self.sync.edit_workflow(workflow_id).await
  }

  pub fn new_workflow(&self) -> Result<(), SyncError> {
    self.close_modal();
    self.sync.new_workflow()
  }

  pub fn reset_workflow(&self) {
    self.close_modal();
    self.sync.reset_workflow();
  }

  pub fn set_details(&self, payload: &WorkflowPayload) -> Result<(), SyncError> {
    self.sync.set_details(payload)
  }

  pub async fn save_workflow(&self) -> Result<Reconciled<WorkflowRecord>, SyncError> {
    self.sync.save_workflow().await
  }

  pub async fn delete_workflow(&self, workflow_id: WorkflowId) -> Result<(), SyncError> {
    self.sync.delete_workflow(workflow_id).await
  }

  // Display

  pub fn snapshot(&self) -> Option<WorkflowRecord> {
    self.sync.snapshot()
  }

  pub fn pretty_workflow(&self) -> Result<String, SyncError> {
    self.sync.pretty_workflow()
  }

  // Modal

  pub fn session_state(&self) -> SessionState {
    self.lock_session().state()
  }

  /// Form contents of the last save attempt, kept while the form is open.
  pub fn session_draft(&self) -> Option<SavePayload> {
    self.lock_session().draft().cloned()
  }

  /// Open a trigger or action form.
  ///
  /// The node the form is opened on must exist in the bound graph.
  pub fn open_modal(&self, request: ModalRequest) -> Result<(), SyncError> {
    match request.existing {
      Some(ExistingNode::Action(action_id)) => {
        self
          .sync
          .read_graph(|graph| graph.locate(action_id).map(|_| ()))?;
      }
      Some(ExistingNode::Trigger(trigger_id)) => {
        self
          .sync
          .read_graph(|graph| graph.locate_trigger(trigger_id).map(|_| ()))?;
      }
      None if !self.sync.is_bound() => return Err(SyncError::NoWorkflow),
      None => {}
    }

    let kind = request.kind;
    self.lock_session().open(request)?;
    self.sync.notify(EditorEvent::SessionOpened { kind });
    Ok(())
  }

  /// Close the form. Saves still in flight are not applied.
  pub fn close_modal(&self) {
    if self.lock_session().close() {
      self.sync.notify(EditorEvent::SessionClosed);
    }
  }

  /// Save the open form.
  ///
  /// On success the session returns to idle. On failure it stays open with
  /// the submitted contents kept. When the action is created but linking it
  /// fails, the action stays in the graph unlinked, the session closes and
  /// `SyncError::LinkFailed` is returned.
  #[instrument(skip_all)]
  pub async fn save(&self, payload: SavePayload) -> Result<SaveOutcome, SyncError> {
    let (plan, token) = self.lock_session().begin_save(payload.clone())?;

    let result = self.execute(plan, payload, token.clone()).await;
    let succeeded = matches!(
      &result,
      Ok(_) | Err(SyncError::LinkFailed { .. })
    );

    let settled = self.lock_session().finish_save(&token, succeeded);
    match &result {
      Ok(SaveOutcome::Discarded) => {}
      Ok(_) => info!(?plan, "form saved"),
      Err(e) => warn!(?plan, error = %e, "form save failed"),
    }
    if settled && succeeded {
      self.sync.notify(EditorEvent::SessionClosed);
    }
    result
  }

  async fn execute(
    &self,
    plan: SavePlan,
    payload: SavePayload,
    token: SessionToken,
  ) -> Result<SaveOutcome, SyncError> {
    match (plan, payload) {
      (SavePlan::UpdateAction { action_id }, SavePayload::Action(mut payload)) => {
        // The form edits content only; structure comes from the graph.
        let current = self.sync.read_graph(|graph| {
          graph
            .locate(action_id)
            .map(|located| located.node.record().clone())
        })?;
        payload.parent_id = current.parent_id;
        payload.on_success = current.on_success;

        let outcome = match self
          .sync
          .update_action_as(action_id, &payload, Some(token))
          .await?
        {
          Reconciled::Applied(record) => SaveOutcome::ActionUpdated(record),
          Reconciled::Discarded => SaveOutcome::Discarded,
        };
        Ok(outcome)
      }
      (
        SavePlan::CreateAction {
          parent_id,
          link_target,
        },
        SavePayload::Action(mut payload),
      ) => {
        payload.parent_id = parent_id;
        let Reconciled::Applied(action) = self
          .sync
          .create_action_as(&payload, Some(token.clone()))
          .await?
        else {
          return Ok(SaveOutcome::Discarded);
        };

        let Some(target_id) = link_target else {
          return Ok(SaveOutcome::ActionCreated {
            action,
            linked_after: None,
          });
        };
        if !token.is_live() {
          debug!(action_id = %action.id, "session closed before linking, link not sent");
          return Ok(SaveOutcome::Discarded);
        }

        match self
          .links()
          .link_as(&action, target_id, Some(token))
          .await
        {
          Ok(linked) => Ok(SaveOutcome::ActionCreated {
            action,
            linked_after: linked.is_applied().then_some(target_id),
          }),
          Err(source) => Err(SyncError::LinkFailed {
            action: Box::new(action),
            target_id,
            source: Box::new(source),
          }),
        }
      }
      (SavePlan::UpdateTrigger { trigger_id }, SavePayload::Trigger(payload)) => {
        let outcome = match self
          .sync
          .update_trigger_as(trigger_id, &payload, Some(token))
          .await?
        {
          Reconciled::Applied(record) => SaveOutcome::TriggerUpdated(record),
          Reconciled::Discarded => SaveOutcome::Discarded,
        };
        Ok(outcome)
      }
      (SavePlan::CreateTrigger, SavePayload::Trigger(payload)) => {
        let outcome = match self.sync.create_trigger_as(&payload, Some(token)).await? {
          Reconciled::Applied(record) => SaveOutcome::TriggerCreated(record),
          Reconciled::Discarded => SaveOutcome::Discarded,
        };
        Ok(outcome)
      }
      (_, SavePayload::Action(_)) => Err(SyncError::PayloadMismatch {
        expected: "trigger",
        actual: "action",
      }),
      (_, SavePayload::Trigger(_)) => Err(SyncError::PayloadMismatch {
        expected: "action",
        actual: "trigger",
      }),
    }
  }

  fn lock_session(&self) -> MutexGuard<'_, EditSession> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
