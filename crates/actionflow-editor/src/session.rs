//! Modal edit session.
//!
//! A session is opened for one trigger or action form, saved once, and
//! returns to idle. Every open and close bumps a shared generation counter;
//! responses carrying a [`SessionToken`] from an older generation are not
//! applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use actionflow_model::{ActionId, ActionPayload, TriggerId, TriggerPayload};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;

/// Which form a session edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalKind {
  Trigger,
  Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
  Creating,
  Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Idle,
  Open(SessionMode),
  Saving(SessionMode),
}

/// The node a modal was opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingNode {
  Action(ActionId),
  Trigger(TriggerId),
}

/// Arguments of [`EditSession::open`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModalRequest {
  pub kind: ModalKind,
  pub existing: Option<ExistingNode>,
  /// Action the newly created action should follow.
  pub link_target: Option<ActionId>,
  /// Create inside `existing` instead of editing it.
  pub nested: bool,
}

impl ModalRequest {
  /// A form for a new root-level action.
  pub fn new_action() -> Self {
    Self {
      kind: ModalKind::Action,
      existing: None,
      link_target: None,
      nested: false,
    }
  }

  pub fn edit_action(action_id: ActionId) -> Self {
    Self {
      existing: Some(ExistingNode::Action(action_id)),
      ..Self::new_action()
    }
  }

  /// A form for a new action inside the body of `parent_id`.
  pub fn nested_in(parent_id: ActionId) -> Self {
    Self {
      existing: Some(ExistingNode::Action(parent_id)),
      nested: true,
      ..Self::new_action()
    }
  }

  pub fn new_trigger() -> Self {
    Self {
      kind: ModalKind::Trigger,
      existing: None,
      link_target: None,
      nested: false,
    }
  }

  pub fn edit_trigger(trigger_id: TriggerId) -> Self {
    Self {
      existing: Some(ExistingNode::Trigger(trigger_id)),
      ..Self::new_trigger()
    }
  }

  /// Link the created action after `target_id` once it exists.
  pub fn after(mut self, target_id: ActionId) -> Self {
    self.link_target = Some(target_id);
    self
  }

  fn mode(&self) -> SessionMode {
    if self.existing.is_some() && !self.nested {
      SessionMode::Editing
    } else {
      SessionMode::Creating
    }
  }
}

/// Form contents submitted on save.
#[derive(Debug, Clone, PartialEq)]
pub enum SavePayload {
  Action(ActionPayload),
  Trigger(TriggerPayload),
}

impl SavePayload {
  fn kind(&self) -> ModalKind {
    match self {
      SavePayload::Action(_) => ModalKind::Action,
      SavePayload::Trigger(_) => ModalKind::Trigger,
    }
  }
}

/// What a save has to do remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePlan {
  UpdateAction {
    action_id: ActionId,
  },
  CreateAction {
    parent_id: Option<ActionId>,
    link_target: Option<ActionId>,
  },
  UpdateTrigger {
    trigger_id: TriggerId,
  },
  CreateTrigger,
}

/// Proof that a response belongs to a particular session generation.
#[derive(Debug, Clone)]
pub struct SessionToken {
  live: Arc<AtomicU64>,
  generation: u64,
}

impl SessionToken {
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// False once the session it was issued by has been closed or reopened.
  pub fn is_live(&self) -> bool {
    self.live.load(Ordering::SeqCst) == self.generation
  }
}

/// Modal state machine: `Idle -> Open -> Saving -> Idle`.
#[derive(Debug)]
pub struct EditSession {
  state: SessionState,
  request: Option<ModalRequest>,
  draft: Option<SavePayload>,
  generation: Arc<AtomicU64>,
}

impl Default for EditSession {
  fn default() -> Self {
    Self::new()
  }
}

impl EditSession {
  pub fn new() -> Self {
    Self {
      state: SessionState::Idle,
      request: None,
      draft: None,
      generation: Arc::new(AtomicU64::new(0)),
    }
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn request(&self) -> Option<&ModalRequest> {
    self.request.as_ref()
  }

  /// The last submitted form contents, kept after a failed save.
  pub fn draft(&self) -> Option<&SavePayload> {
    self.draft.as_ref()
  }

  pub fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  /// Open a form. Opening over an existing session replaces it.
  ///
  /// Trigger forms have no link or nesting; those fields are dropped.
  pub fn open(&mut self, mut request: ModalRequest) -> Result<SessionToken, SyncError> {
    match request.kind {
      ModalKind::Action => {
        if matches!(request.existing, Some(ExistingNode::Trigger(_))) {
          return Err(SyncError::PayloadMismatch {
            expected: "action",
            actual: "trigger",
          });
        }
        if request.nested && request.existing.is_none() {
          return Err(SyncError::NestedWithoutParent);
        }
      }
      ModalKind::Trigger => {
        if matches!(request.existing, Some(ExistingNode::Action(_))) {
          return Err(SyncError::PayloadMismatch {
            expected: "trigger",
            actual: "action",
          });
        }
        if request.link_target.is_some() || request.nested {
          debug!("ignoring link and nesting on a trigger form");
          request.link_target = None;
          request.nested = false;
        }
      }
    }

    if self.state != SessionState::Idle {
      debug!(state = ?self.state, "replacing open session");
    }

    let mode = request.mode();
    self.state = SessionState::Open(mode);
    self.request = Some(request);
    self.draft = None;
    Ok(self.bump())
  }

  /// Move to `Saving` and work out what the save has to do.
  pub fn begin_save(&mut self, payload: SavePayload) -> Result<(SavePlan, SessionToken), SyncError> {
    let mode = match self.state {
      SessionState::Open(mode) => mode,
      SessionState::Saving(_) => return Err(SyncError::SaveInProgress),
      SessionState::Idle => return Err(SyncError::SessionNotOpen),
    };
    let request = self.request.as_ref().ok_or(SyncError::SessionNotOpen)?;

    if payload.kind() != request.kind {
      return Err(SyncError::PayloadMismatch {
        expected: kind_name(request.kind),
        actual: kind_name(payload.kind()),
      });
    }

    let plan = match (request.existing, request.nested) {
      (Some(ExistingNode::Action(action_id)), false) => SavePlan::UpdateAction { action_id },
      (Some(ExistingNode::Action(parent_id)), true) => SavePlan::CreateAction {
        parent_id: Some(parent_id),
        link_target: request.link_target,
      },
      (None, _) if request.kind == ModalKind::Action => SavePlan::CreateAction {
        parent_id: None,
        link_target: request.link_target,
      },
      (Some(ExistingNode::Trigger(trigger_id)), _) => SavePlan::UpdateTrigger { trigger_id },
      (None, _) => SavePlan::CreateTrigger,
    };

    self.state = SessionState::Saving(mode);
    self.draft = Some(payload);
    Ok((plan, self.token()))
  }

  /// Settle a save. Success closes the session; failure reopens it with the
  /// form contents kept. Returns false if `token` is stale.
  pub fn finish_save(&mut self, token: &SessionToken, succeeded: bool) -> bool {
    if !token.is_live() {
      return false;
    }
    let SessionState::Saving(mode) = self.state else {
      return false;
    };

    if succeeded {
      self.reset();
    } else {
      self.state = SessionState::Open(mode);
    }
    true
  }

  /// Return to idle from any state. In-flight saves are not cancelled but
  /// their responses will no longer be applied.
  pub fn close(&mut self) -> bool {
    let was_open = self.state != SessionState::Idle;
    self.reset();
    self.bump();
    was_open
  }

  fn reset(&mut self) {
    self.state = SessionState::Idle;
    self.request = None;
    self.draft = None;
  }

  fn bump(&self) -> SessionToken {
    self.generation.fetch_add(1, Ordering::SeqCst);
    self.token()
  }

  fn token(&self) -> SessionToken {
    SessionToken {
      live: Arc::clone(&self.generation),
      generation: self.generation.load(Ordering::SeqCst),
    }
  }
}

fn kind_name(kind: ModalKind) -> &'static str {
  match kind {
    ModalKind::Action => "action",
    ModalKind::Trigger => "trigger",
  }
}
