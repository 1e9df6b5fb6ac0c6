//! Editing against the in-memory store: reconciliation, linking and the
//! modal save flow.

use std::sync::Arc;

use actionflow_editor::{
  ModalRequest, NodeKind, Reconciled, SaveOutcome, SavePayload, SessionMode, SessionState,
  SyncError, WorkflowEditor,
};
use actionflow_model::{
  ActionId, ActionPayload, Connection, ITERATION_ACTION_TYPE, TriggerPayload, WorkflowId,
  WorkflowPayload,
};
use actionflow_remote::{Fault, MemoryRemoteStore, Operation, RemoteStore};
use serde_json::json;

fn workflow_payload(name: &str) -> WorkflowPayload {
  WorkflowPayload {
    name: name.to_string(),
    description: String::new(),
    store_ref: String::new(),
    trigger: None,
  }
}

fn step() -> ActionPayload {
  ActionPayload::new(2, 1, json!({ "channel": "#ops" }))
}

fn iteration() -> ActionPayload {
  ActionPayload::new(ITERATION_ACTION_TYPE, 1, json!({ "over": "items" }))
}

/// An editor bound to a freshly created, empty workflow.
async fn bound_editor() -> (WorkflowEditor, Arc<MemoryRemoteStore>) {
  let remote = Arc::new(MemoryRemoteStore::new());
  let editor = WorkflowEditor::new(remote.clone());
  let workflow = editor
    .sync()
    .create_workflow(&workflow_payload("orders"))
    .await
    .unwrap();
  editor.edit_workflow(workflow.id.unwrap()).await.unwrap();
  (editor, remote)
}

async fn create(editor: &WorkflowEditor, payload: ActionPayload) -> ActionId {
  editor
    .sync()
    .create_action(&payload)
    .await
    .unwrap()
    .applied()
    .unwrap()
    .id
}

fn roots(editor: &WorkflowEditor) -> Vec<ActionId> {
  editor.sync().with_graph(|g| g.roots().to_vec()).unwrap()
}

fn on_success(editor: &WorkflowEditor, id: ActionId) -> Option<ActionId> {
  editor
    .sync()
    .with_graph(|g| g.node(id).and_then(|n| n.on_success()))
    .unwrap()
}

#[tokio::test]
async fn test_link_new_node_after_target() {
  let (editor, remote) = bound_editor().await;
  let a = create(&editor, step()).await;
  assert_eq!(a, ActionId(1));

  editor
    .open_modal(ModalRequest::new_action().after(a))
    .unwrap();
  let outcome = editor.save(SavePayload::Action(step())).await.unwrap();

  let SaveOutcome::ActionCreated {
    action,
    linked_after,
  } = outcome
  else {
    panic!("expected a created action");
  };
  assert_eq!(action.id, ActionId(2));
  assert_eq!(linked_after, Some(a));
  assert_eq!(on_success(&editor, a), Some(ActionId(2)));
  assert_eq!(roots(&editor), vec![ActionId(1), ActionId(2)]);
  assert_eq!(remote.action(a).unwrap().on_success, Some(ActionId(2)));
  assert_eq!(editor.session_state(), SessionState::Idle);
}

#[tokio::test]
async fn test_failed_create_attempts_no_link() {
  let (editor, remote) = bound_editor().await;
  let a = create(&editor, step()).await;

  editor
    .open_modal(ModalRequest::new_action().after(a))
    .unwrap();
  remote.fail_next(
    Operation::CreateAction,
    Fault::Reject("The provider_id field is invalid.".to_string()),
  );
  let result = editor.save(SavePayload::Action(step())).await;

  assert!(matches!(
    &result,
    Err(SyncError::RemoteRejected { message }) if message == "The provider_id field is invalid."
  ));
  assert_eq!(remote.calls_to(Operation::UpdateAction), 0);
  assert_eq!(roots(&editor), vec![a]);
  assert_eq!(on_success(&editor, a), None);
  assert_eq!(
    editor.session_state(),
    SessionState::Open(SessionMode::Creating)
  );
  assert_eq!(editor.session_draft(), Some(SavePayload::Action(step())));
}

#[tokio::test]
async fn test_failed_link_keeps_created_node_unlinked() {
  let (editor, remote) = bound_editor().await;
  let a = create(&editor, step()).await;

  editor
    .open_modal(ModalRequest::new_action().after(a))
    .unwrap();
  remote.fail_next(
    Operation::UpdateAction,
    Fault::Transport("connection reset".to_string()),
  );
  let result = editor.save(SavePayload::Action(step())).await;

  let Err(SyncError::LinkFailed {
    action,
    target_id,
    source,
  }) = result
  else {
    panic!("expected a link failure");
  };
  assert_eq!(target_id, a);
  assert!(matches!(*source, SyncError::TransportFailure(_)));
  assert_eq!(roots(&editor), vec![a, action.id]);
  assert_eq!(on_success(&editor, a), None);
  assert!(remote.action(action.id).is_some());
  assert_eq!(editor.session_state(), SessionState::Idle);
}

#[tokio::test]
async fn test_transport_failure_leaves_graph_unchanged() {
  let (editor, remote) = bound_editor().await;
  let before = editor.snapshot();

  remote.fail_next(
    Operation::CreateAction,
    Fault::Transport("offline".to_string()),
  );
  let result = editor.sync().create_action(&step()).await;

  assert!(matches!(result, Err(SyncError::TransportFailure(_))));
  assert_eq!(editor.snapshot(), before);
}

#[tokio::test]
async fn test_link_target_outside_scope_is_not_sent() {
  let (editor, remote) = bound_editor().await;
  let container = create(&editor, iteration()).await;
  let child = create(&editor, step().with_parent(container)).await;
  let root_step = editor
    .sync()
    .create_action(&step())
    .await
    .unwrap()
    .applied()
    .unwrap();

  let result = editor.links().link(&root_step, child).await;

  assert!(matches!(
    result,
    Err(SyncError::NodeNotFound {
      kind: NodeKind::Action,
      id
    }) if id == child.0
  ));
  assert_eq!(remote.calls_to(Operation::UpdateAction), 0);
}

#[tokio::test]
async fn test_link_replaces_existing_successor() {
  let (editor, _remote) = bound_editor().await;
  let a = create(&editor, step()).await;
  let b = editor
    .sync()
    .create_action(&step())
    .await
    .unwrap()
    .applied()
    .unwrap();
  let c = editor
    .sync()
    .create_action(&step())
    .await
    .unwrap()
    .applied()
    .unwrap();

  editor.links().link(&b, a).await.unwrap();
  assert_eq!(on_success(&editor, a), Some(b.id));

  editor.links().link(&c, a).await.unwrap();
  assert_eq!(on_success(&editor, a), Some(c.id));

  editor.links().unlink(a).await.unwrap();
  assert_eq!(on_success(&editor, a), None);
}

#[tokio::test]
async fn test_nested_save_creates_child() {
  let (editor, remote) = bound_editor().await;
  let container = create(&editor, iteration()).await;
  let sibling = create(&editor, step().with_parent(container)).await;

  editor
    .open_modal(ModalRequest::nested_in(container).after(sibling))
    .unwrap();
  let outcome = editor.save(SavePayload::Action(step())).await.unwrap();

  let SaveOutcome::ActionCreated { action, .. } = outcome else {
    panic!("expected a created action");
  };
  assert_eq!(action.parent_id, Some(container));
  let (children, count) = editor
    .sync()
    .with_graph(|g| {
      let node = g.node(container).unwrap();
      (node.children().to_vec(), node.record().actions_count)
    })
    .unwrap();
  assert_eq!(children, vec![sibling, action.id]);
  assert_eq!(count, 2);
  assert_eq!(on_success(&editor, sibling), Some(action.id));
  assert_eq!(remote.action(container).unwrap().actions_count, 2);
}

#[tokio::test]
async fn test_edit_keeps_position_and_links() {
  let (editor, _remote) = bound_editor().await;
  let a = create(&editor, step()).await;
  let b = create(&editor, step().with_on_success(Some(a))).await;
  let c = create(&editor, step()).await;

  editor.open_modal(ModalRequest::edit_action(b)).unwrap();
  let updated = ActionPayload::new(3, 4, json!({ "url": "https://example.com" }));
  let outcome = editor.save(SavePayload::Action(updated)).await.unwrap();

  let SaveOutcome::ActionUpdated(record) = outcome else {
    panic!("expected an updated action");
  };
  assert_eq!(record.action_type_id, 3);
  assert_eq!(record.on_success, Some(a));
  assert_eq!(roots(&editor), vec![a, b, c]);
}

#[tokio::test]
async fn test_delete_only_child_empties_container() {
  let (editor, _remote) = bound_editor().await;
  let parent = create(&editor, iteration()).await;
  let child = create(&editor, step().with_parent(parent)).await;

  let deleted = editor.sync().delete_action(child).await.unwrap();

  assert_eq!(deleted, Reconciled::Applied(child));
  let (children, count) = editor
    .sync()
    .with_graph(|g| {
      let node = g.node(parent).unwrap();
      (node.children().to_vec(), node.record().actions_count)
    })
    .unwrap();
  assert!(children.is_empty());
  assert_eq!(count, 0);
}

#[tokio::test]
async fn test_delete_clears_links_to_deleted_node() {
  let (editor, _remote) = bound_editor().await;
  let a = create(&editor, step()).await;
  let b = create(&editor, step().with_on_success(Some(a))).await;

  editor.sync().delete_action(a).await.unwrap();

  assert_eq!(roots(&editor), vec![b]);
  assert_eq!(on_success(&editor, b), None);
  editor.sync().with_graph(|g| g.validate().unwrap()).unwrap();
}

#[tokio::test]
async fn test_delete_unknown_action_is_not_sent() {
  let (editor, remote) = bound_editor().await;

  let result = editor.sync().delete_action(ActionId(42)).await;

  assert!(matches!(
    result,
    Err(SyncError::NodeNotFound {
      kind: NodeKind::Action,
      id: 42
    })
  ));
  assert_eq!(remote.calls_to(Operation::DeleteAction), 0);
}

#[tokio::test]
async fn test_link_node_missing_from_graph_is_not_sent() {
  let (editor, remote) = bound_editor().await;
  let a = create(&editor, step()).await;
  let workflow_id = editor
    .sync()
    .with_graph(|g| g.workflow_id())
    .flatten()
    .unwrap();

  // Created behind the editor's back, so the local graph never saw it.
  remote.create_action(workflow_id, &step()).await.unwrap();
  let outside = remote.action(ActionId(2)).unwrap();
  let updates = remote.calls_to(Operation::UpdateAction);

  let result = editor.links().link(&outside, a).await;

  assert!(matches!(
    result,
    Err(SyncError::NodeNotFound {
      kind: NodeKind::Action,
      id: 2
    })
  ));
  assert_eq!(remote.calls_to(Operation::UpdateAction), updates);
  assert_eq!(on_success(&editor, a), None);
  assert_eq!(remote.action(a).unwrap().on_success, None);
  editor
    .sync()
    .with_graph(|g| g.validate())
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn test_link_uses_graph_scope_over_record_parent() {
  let (editor, remote) = bound_editor().await;
  let a = create(&editor, step()).await;
  let container = create(&editor, iteration()).await;
  let child = create(&editor, step().with_parent(container)).await;
  let b = create(&editor, step()).await;
  let record = |id: ActionId| {
    editor
      .sync()
      .with_graph(|g| g.node(id).map(|n| n.record().clone()))
      .flatten()
      .unwrap()
  };

  // A root node whose record claims the container still links among roots.
  let mut moved_in = record(b);
  moved_in.parent_id = Some(container);
  let linked = editor.links().link(&moved_in, a).await.unwrap();
  assert!(linked.is_applied());
  assert_eq!(on_success(&editor, a), Some(b));

  // A nested node whose record claims the root cannot reach a root target.
  let mut moved_out = record(child);
  moved_out.parent_id = None;
  let updates = remote.calls_to(Operation::UpdateAction);
  let result = editor.links().link(&moved_out, a).await;

  assert!(matches!(
    result,
    Err(SyncError::NodeNotFound {
      kind: NodeKind::Action,
      id: 1
    })
  ));
  assert_eq!(remote.calls_to(Operation::UpdateAction), updates);
  assert_eq!(on_success(&editor, a), Some(b));
}

#[tokio::test]
async fn test_update_absent_workflow_is_not_sent() {
  let (editor, remote) = bound_editor().await;

  let result = editor
    .sync()
    .update_workflow(WorkflowId(9), &workflow_payload("billing"))
    .await;

  assert!(matches!(
    result,
    Err(SyncError::NodeNotFound {
      kind: NodeKind::Workflow,
      id: 9
    })
  ));
  assert_eq!(remote.calls_to(Operation::UpdateWorkflow), 0);
}

#[tokio::test]
async fn test_create_under_unknown_parent_is_not_sent() {
  let (editor, remote) = bound_editor().await;

  let result = editor
    .sync()
    .create_action(&step().with_parent(ActionId(9)))
    .await;

  assert!(matches!(result, Err(SyncError::ParentNotFound(ActionId(9)))));
  assert_eq!(remote.calls_to(Operation::CreateAction), 0);
}

#[tokio::test]
async fn test_delete_absent_workflow_is_not_sent() {
  let (editor, remote) = bound_editor().await;
  let listed = editor.sync().workflows();

  let result = editor.delete_workflow(WorkflowId(5)).await;

  assert!(matches!(
    result,
    Err(SyncError::NodeNotFound {
      kind: NodeKind::Workflow,
      id: 5
    })
  ));
  assert_eq!(remote.calls_to(Operation::DeleteWorkflow), 0);
  assert_eq!(editor.sync().workflows(), listed);
}

#[tokio::test]
async fn test_delete_bound_workflow_unbinds_graph() {
  let (editor, remote) = bound_editor().await;
  let workflow_id = editor
    .sync()
    .with_graph(|g| g.workflow_id())
    .flatten()
    .unwrap();

  editor.delete_workflow(workflow_id).await.unwrap();

  assert!(editor.snapshot().is_none());
  assert!(editor.sync().workflows().is_empty());
  assert!(remote.workflow(workflow_id).is_none());
}

#[tokio::test]
async fn test_trigger_form_creates_then_updates() {
  let (editor, remote) = bound_editor().await;

  editor.open_modal(ModalRequest::new_trigger()).unwrap();
  let created = editor
    .save(SavePayload::Trigger(TriggerPayload::new(
      1,
      5,
      json!({ "cron": "0 * * * *" }),
    )))
    .await
    .unwrap();
  let SaveOutcome::TriggerCreated(trigger) = created else {
    panic!("expected a created trigger");
  };

  editor
    .open_modal(ModalRequest::edit_trigger(trigger.id))
    .unwrap();
  let updated = editor
    .save(SavePayload::Trigger(TriggerPayload::new(
      1,
      5,
      json!({ "cron": "*/5 * * * *" }),
    )))
    .await
    .unwrap();

  assert!(matches!(updated, SaveOutcome::TriggerUpdated(ref t) if t.id == trigger.id));
  let triggers = editor.sync().with_graph(|g| g.triggers().to_vec()).unwrap();
  assert_eq!(triggers.len(), 1);
  assert_eq!(triggers[0].config, json!({ "cron": "*/5 * * * *" }));
  assert_eq!(remote.calls_to(Operation::UpdateTrigger), 1);
}

#[tokio::test]
async fn test_action_form_on_unknown_node_is_rejected() {
  let (editor, _remote) = bound_editor().await;

  let result = editor.open_modal(ModalRequest::edit_action(ActionId(7)));

  assert!(matches!(result, Err(SyncError::NodeNotFound { id: 7, .. })));
  assert_eq!(editor.session_state(), SessionState::Idle);
}

#[tokio::test]
async fn test_draft_workflow_is_created_then_updated() {
  let remote = Arc::new(MemoryRemoteStore::new());
  let editor = WorkflowEditor::new(remote.clone());
  editor.new_workflow().unwrap();
  assert_eq!(editor.snapshot().unwrap().name, "new workflow");

  editor.set_details(&workflow_payload("invoices")).unwrap();
  let created = editor.save_workflow().await.unwrap().applied().unwrap();
  let workflow_id = created.id.unwrap();
  assert_eq!(editor.sync().workflows().len(), 1);

  editor.set_details(&workflow_payload("invoices v2")).unwrap();
  editor.save_workflow().await.unwrap();

  assert_eq!(remote.calls_to(Operation::CreateWorkflow), 1);
  assert_eq!(remote.calls_to(Operation::UpdateWorkflow), 1);
  assert_eq!(remote.workflow(workflow_id).unwrap().name, "invoices v2");
  assert_eq!(editor.sync().workflows()[0].name, "invoices v2");
  assert_eq!(editor.snapshot().unwrap().id, Some(workflow_id));
}

#[tokio::test]
async fn test_rejected_workflow_keeps_list() {
  let remote = Arc::new(MemoryRemoteStore::new());
  let editor = WorkflowEditor::new(remote.clone());

  let result = editor.sync().create_workflow(&workflow_payload(" ")).await;

  assert!(matches!(
    result,
    Err(SyncError::RemoteRejected { ref message }) if message == "The name field is required."
  ));
  assert!(editor.sync().workflows().is_empty());
}

#[tokio::test]
async fn test_edit_workflow_loads_nested_tree() {
  let (editor, _remote) = bound_editor().await;
  let container = create(&editor, iteration()).await;
  let child = create(&editor, step().with_parent(container)).await;
  let workflow_id = editor
    .sync()
    .with_graph(|g| g.workflow_id())
    .flatten()
    .unwrap();

  editor.reset_workflow();
  assert!(editor.snapshot().is_none());

  editor.fetch_workflows().await.unwrap();
  let loaded = editor.edit_workflow(workflow_id).await.unwrap();

  assert_eq!(loaded.actions.len(), 1);
  assert_eq!(loaded.actions[0].actions[0].id, child);
  assert!(loaded.actions[0].action.is_none());
  let located = editor
    .sync()
    .with_graph(|g| g.locate(child).map(|l| l.path).unwrap())
    .unwrap();
  assert_eq!(located, vec![container]);
}

#[tokio::test]
async fn test_connections_by_driver() {
  let remote = Arc::new(MemoryRemoteStore::with_connections(vec![
    Connection {
      id: 1,
      name: "ops workspace".to_string(),
      driver: "slack".to_string(),
    },
    Connection {
      id: 2,
      name: "billing db".to_string(),
      driver: "postgres".to_string(),
    },
  ]));
  let editor = WorkflowEditor::new(remote);

  assert_eq!(editor.sync().fetch_connections().await.unwrap().len(), 2);
  let slack = editor.sync().connections_by_driver("slack");
  assert_eq!(slack.len(), 1);
  assert_eq!(slack[0].name, "ops workspace");
  assert!(editor.sync().connections_by_driver("smtp").is_empty());
}
