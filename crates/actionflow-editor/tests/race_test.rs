//! Responses that come back after their session or graph moved on.

use std::sync::{Arc, OnceLock};

use actionflow_editor::{
  ChannelNotifier, EditorEvent, EditorNotifier, ModalKind, ModalRequest, Reconciled, SaveOutcome,
  SavePayload, SessionMode, SessionState, WorkflowEditor,
};
use actionflow_model::{ActionId, ActionPayload, WorkflowPayload};
use actionflow_remote::{MemoryRemoteStore, Operation};
use serde_json::json;
use tokio::sync::mpsc;

fn step() -> ActionPayload {
  ActionPayload::new(2, 1, json!({}))
}

async fn bound_editor(
  remote: &Arc<MemoryRemoteStore>,
) -> (WorkflowEditor, mpsc::UnboundedReceiver<EditorEvent>) {
  let (tx, rx) = mpsc::unbounded_channel();
  let editor = WorkflowEditor::with_notifier(remote.clone(), Arc::new(ChannelNotifier::new(tx)));
  let payload = WorkflowPayload {
    name: "orders".to_string(),
    description: String::new(),
    store_ref: String::new(),
    trigger: None,
  };
  let workflow = editor.sync().create_workflow(&payload).await.unwrap();
  editor.edit_workflow(workflow.id.unwrap()).await.unwrap();
  (editor, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<EditorEvent>) -> Vec<EditorEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}

#[tokio::test]
async fn test_close_during_save_discards_response() {
  let remote = Arc::new(MemoryRemoteStore::new());
  let (editor, mut rx) = bound_editor(&remote).await;
  let before = editor.snapshot();
  drain(&mut rx);

  editor.open_modal(ModalRequest::new_action()).unwrap();
  let hold = remote.hold(Operation::CreateAction);
  let task = tokio::spawn({
    let editor = editor.clone();
    async move { editor.save(SavePayload::Action(step())).await }
  });

  hold.entered().await;
  assert_eq!(
    editor.session_state(),
    SessionState::Saving(SessionMode::Creating)
  );
  editor.close_modal();
  hold.release();

  let outcome = task.await.unwrap().unwrap();
  assert_eq!(outcome, SaveOutcome::Discarded);
  assert_eq!(editor.snapshot(), before);
  assert_eq!(editor.session_state(), SessionState::Idle);
  // The store did create it; only the local graph ignores the response.
  assert!(remote.action(ActionId(1)).is_some());

  assert_eq!(
    drain(&mut rx),
    vec![
      EditorEvent::SessionOpened {
        kind: ModalKind::Action
      },
      EditorEvent::SessionClosed,
      EditorEvent::ResponseDiscarded {
        operation: "create_action".to_string()
      },
    ]
  );
}

#[tokio::test]
async fn test_reopen_during_save_keeps_new_session() {
  let remote = Arc::new(MemoryRemoteStore::new());
  let (editor, _rx) = bound_editor(&remote).await;

  editor.open_modal(ModalRequest::new_action()).unwrap();
  let hold = remote.hold(Operation::CreateAction);
  let task = tokio::spawn({
    let editor = editor.clone();
    async move { editor.save(SavePayload::Action(step())).await }
  });

  hold.entered().await;
  editor.open_modal(ModalRequest::new_trigger()).unwrap();
  hold.release();

  assert_eq!(task.await.unwrap().unwrap(), SaveOutcome::Discarded);
  assert_eq!(
    editor.session_state(),
    SessionState::Open(SessionMode::Creating)
  );
  assert!(editor.snapshot().unwrap().actions.is_empty());
}

#[tokio::test]
async fn test_reset_during_delete_discards_response() {
  let remote = Arc::new(MemoryRemoteStore::new());
  let (editor, _rx) = bound_editor(&remote).await;
  let a = editor
    .sync()
    .create_action(&step())
    .await
    .unwrap()
    .applied()
    .unwrap()
    .id;
  let workflow_id = editor
    .sync()
    .with_graph(|g| g.workflow_id())
    .flatten()
    .unwrap();

  let hold = remote.hold(Operation::DeleteAction);
  let task = tokio::spawn({
    let editor = editor.clone();
    async move { editor.sync().delete_action(a).await }
  });

  hold.entered().await;
  editor.reset_workflow();
  editor.edit_workflow(workflow_id).await.unwrap();
  hold.release();

  assert_eq!(task.await.unwrap().unwrap(), Reconciled::Discarded);
  // The reloaded graph was read before the delete landed.
  assert!(editor.sync().with_graph(|g| g.node(a).is_some()).unwrap());
}

/// Closes the editor's form as soon as the graph changes.
#[derive(Default)]
struct CloseOnGraphChange {
  editor: OnceLock<WorkflowEditor>,
}

impl EditorNotifier for CloseOnGraphChange {
  fn notify(&self, event: EditorEvent) {
    if let (EditorEvent::GraphChanged { .. }, Some(editor)) = (event, self.editor.get()) {
      editor.close_modal();
    }
  }
}

#[tokio::test]
async fn test_close_between_create_and_link_skips_link() {
  let remote = Arc::new(MemoryRemoteStore::new());
  let notifier = Arc::new(CloseOnGraphChange::default());
  let editor = WorkflowEditor::with_notifier(remote.clone(), notifier.clone());
  let payload = WorkflowPayload {
    name: "orders".to_string(),
    description: String::new(),
    store_ref: String::new(),
    trigger: None,
  };
  let workflow = editor.sync().create_workflow(&payload).await.unwrap();
  editor.edit_workflow(workflow.id.unwrap()).await.unwrap();
  let a = editor
    .sync()
    .create_action(&step())
    .await
    .unwrap()
    .applied()
    .unwrap()
    .id;
  let _ = notifier.editor.set(editor.clone());

  editor
    .open_modal(ModalRequest::new_action().after(a))
    .unwrap();
  let outcome = editor.save(SavePayload::Action(step())).await.unwrap();

  assert_eq!(outcome, SaveOutcome::Discarded);
  assert_eq!(remote.calls_to(Operation::UpdateAction), 0);
  assert_eq!(editor.session_state(), SessionState::Idle);
  // The create itself landed before the form closed.
  let (roots, next) = editor
    .sync()
    .with_graph(|g| (g.roots().to_vec(), g.node(a).and_then(|n| n.on_success())))
    .unwrap();
  assert_eq!(roots, vec![a, ActionId(2)]);
  assert_eq!(next, None);
  assert_eq!(remote.action(a).unwrap().on_success, None);
}
