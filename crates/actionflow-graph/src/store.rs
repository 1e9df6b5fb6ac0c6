use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use actionflow_model::{
  ActionId, ActionRecord, TriggerId, TriggerRecord, WorkflowId, WorkflowPayload, WorkflowRecord,
};
use tracing::{debug, warn};

use crate::error::GraphError;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// A nesting scope: the workflow root or the body of one container action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
  Root,
  Children(ActionId),
}

impl Scope {
  /// The scope an action with the given `parent_id` belongs to.
  pub fn of(parent_id: Option<ActionId>) -> Self {
    match parent_id {
      Some(parent_id) => Scope::Children(parent_id),
      None => Scope::Root,
    }
  }

  pub fn parent_id(self) -> Option<ActionId> {
    match self {
      Scope::Root => None,
      Scope::Children(parent_id) => Some(parent_id),
    }
  }
}

/// An action held by the store.
///
/// The record's nested `actions` are always empty here; the body of a
/// container is tracked as an ordered list of child ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
  record: ActionRecord,
  children: Vec<ActionId>,
}

impl ActionNode {
  pub fn id(&self) -> ActionId {
    self.record.id
  }

  pub fn record(&self) -> &ActionRecord {
    &self.record
  }

  pub fn parent_id(&self) -> Option<ActionId> {
    self.record.parent_id
  }

  pub fn on_success(&self) -> Option<ActionId> {
    self.record.on_success
  }

  pub fn children(&self) -> &[ActionId] {
    &self.children
  }

  pub fn scope(&self) -> Scope {
    Scope::of(self.record.parent_id)
  }
}

/// Where an action lives.
#[derive(Debug, Clone)]
pub struct Located<'a> {
  /// Collection containing the action.
  pub scope: Scope,
  /// Position inside that collection.
  pub index: usize,
  /// Ancestor container ids, outermost first.
  pub path: Vec<ActionId>,
  pub node: &'a ActionNode,
}

/// What [`GraphStore::remove`] took out of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
  pub record: ActionRecord,
  pub scope: Scope,
  pub index: usize,
  /// Siblings whose `on_success` pointed at the removed action.
  pub unlinked: Vec<ActionId>,
  /// Body of a removed container, dropped along with it.
  pub descendants: Vec<ActionId>,
}

/// Canonical in-memory representation of one workflow.
#[derive(Debug)]
pub struct GraphStore {
  /// Identity of this graph instance; a reloaded workflow gets a new one.
  epoch: u64,
  /// Workflow settings. `triggers` and `actions` are always empty here.
  details: WorkflowRecord,
  triggers: Vec<TriggerRecord>,
  nodes: HashMap<ActionId, ActionNode>,
  roots: Vec<ActionId>,
}

impl GraphStore {
  /// Build a graph from a workflow record and its nested action tree.
  ///
  /// Children listed inside a container's `actions` are placed in that
  /// container. Root-level entries that carry a `parent_id` (flat listings)
  /// are moved under their parent; if the parent is absent the load fails.
  pub fn new(mut workflow: WorkflowRecord) -> Result<Self, GraphError> {
    let triggers = std::mem::take(&mut workflow.triggers);
    let actions = std::mem::take(&mut workflow.actions);

    let mut store = Self {
      epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
      details: workflow,
      triggers,
      nodes: HashMap::new(),
      roots: Vec::new(),
    };

    let mut detached = Vec::new();
    for record in actions {
      if record.parent_id.is_some() {
        detached.push(record);
      } else {
        store.ingest(Scope::Root, record)?;
      }
    }

    // A detached child may itself be the parent of another detached child,
    // so keep placing until a pass makes no progress.
    while !detached.is_empty() {
      let before = detached.len();
      let mut pending = Vec::new();
      for record in detached {
        match record.parent_id {
          Some(parent_id) if store.nodes.contains_key(&parent_id) => {
            store.ingest(Scope::Children(parent_id), record)?;
          }
          _ => pending.push(record),
        }
      }
      if pending.len() == before {
        let parent_id = pending
          .iter()
          .find_map(|r| r.parent_id)
          .unwrap_or(pending[0].id);
        return Err(GraphError::ParentNotFound(parent_id));
      }
      detached = pending;
    }

    debug!(
      epoch = store.epoch,
      actions = store.nodes.len(),
      triggers = store.triggers.len(),
      "graph loaded"
    );

    Ok(store)
  }

  /// Identity of this graph instance.
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn workflow_id(&self) -> Option<WorkflowId> {
    self.details.id
  }

  /// Workflow settings without triggers or actions.
  pub fn details(&self) -> &WorkflowRecord {
    &self.details
  }

  /// Apply locally edited workflow settings.
  pub fn set_details(&mut self, payload: &WorkflowPayload) {
    self.details.name = payload.name.clone();
    self.details.description = payload.description.clone();
    self.details.store_ref = payload.store_ref.clone();
    self.details.trigger = payload.trigger.clone();
  }

  /// Take over the store's representation of the workflow settings.
  ///
  /// Triggers and actions in `record` are ignored; the graph keeps its own.
  pub fn merge_details(&mut self, mut record: WorkflowRecord) {
    record.triggers.clear();
    record.actions.clear();
    self.details = record;
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn node(&self, id: ActionId) -> Option<&ActionNode> {
    self.nodes.get(&id)
  }

  pub fn roots(&self) -> &[ActionId] {
    &self.roots
  }

  /// The ordered ids of one nesting scope.
  pub fn scope(&self, scope: Scope) -> Result<&[ActionId], GraphError> {
    self.collection(scope).map(Vec::as_slice)
  }

  /// Find an action anywhere in the tree.
  pub fn locate(&self, id: ActionId) -> Result<Located<'_>, GraphError> {
    let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
    let scope = node.scope();
    let index = self
      .collection(scope)?
      .iter()
      .position(|child| *child == id)
      .ok_or(GraphError::NodeNotFound(id))?;
    let path = self.ancestors(node)?;

    Ok(Located {
      scope,
      index,
      path,
      node,
    })
  }

  /// Find an action inside one nesting scope only.
  pub fn find_in_scope(&self, scope: Scope, id: ActionId) -> Result<Located<'_>, GraphError> {
    let index = self
      .collection(scope)?
      .iter()
      .position(|child| *child == id)
      .ok_or(GraphError::NodeNotFound(id))?;
    let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
    let path = self.ancestors(node)?;

    Ok(Located {
      scope,
      index,
      path,
      node,
    })
  }

  /// Append a freshly created action to the scope named by its `parent_id`.
  ///
  /// Nested children carried by the record are inserted with it. The
  /// parent's cached child count is incremented.
  pub fn insert(&mut self, record: ActionRecord) -> Result<(Scope, usize), GraphError> {
    let scope = Scope::of(record.parent_id);
    if let Scope::Children(parent_id) = scope
      && !self.nodes.contains_key(&parent_id)
    {
      return Err(GraphError::ParentNotFound(parent_id));
    }

    let mut incoming = HashSet::new();
    collect_ids(&record, &mut incoming, &self.nodes)?;

    self.ingest(scope, record)?;
    let index = self.collection(scope)?.len() - 1;

    if let Scope::Children(parent_id) = scope
      && let Some(parent) = self.nodes.get_mut(&parent_id)
    {
      parent.record.actions_count += 1;
    }

    Ok((scope, index))
  }

  /// Replace an action in place with the store's representation.
  ///
  /// The action keeps its position and its children. A `parent_id` in the
  /// replacement that disagrees with the current scope is ignored.
  pub fn replace(&mut self, mut record: ActionRecord) -> Result<(Scope, usize), GraphError> {
    let (scope, index) = {
      let located = self.locate(record.id)?;
      (located.scope, located.index)
    };

    if record.parent_id != scope.parent_id() {
      warn!(
        action_id = %record.id,
        "replacement names a different parent, keeping current position"
      );
      record.parent_id = scope.parent_id();
    }
    if !record.actions.is_empty() {
      debug!(action_id = %record.id, "ignoring nested actions in replacement");
      record.actions.clear();
    }

    let node = self
      .nodes
      .get_mut(&record.id)
      .ok_or(GraphError::NodeNotFound(record.id))?;
    node.record = record;

    Ok((scope, index))
  }

  /// Remove an action (and the body of a container).
  ///
  /// Siblings in the same scope whose `on_success` pointed at the removed
  /// action are unlinked. Other scopes are left untouched.
  pub fn remove(&mut self, id: ActionId) -> Result<Removed, GraphError> {
    let (scope, index) = {
      let located = self.locate(id)?;
      (located.scope, located.index)
    };

    self.collection_mut(scope)?.remove(index);
    let node = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
    let descendants = self.drop_subtree(&node.children);

    let siblings = self.collection(scope)?.clone();
    let mut unlinked = Vec::new();
    for sibling_id in siblings {
      if let Some(sibling) = self.nodes.get_mut(&sibling_id)
        && sibling.record.on_success == Some(id)
      {
        sibling.record.on_success = None;
        unlinked.push(sibling_id);
      }
    }

    if let Scope::Children(parent_id) = scope
      && let Some(parent) = self.nodes.get_mut(&parent_id)
    {
      parent.record.actions_count = parent.record.actions_count.saturating_sub(1);
    }

    Ok(Removed {
      record: node.record,
      scope,
      index,
      unlinked,
      descendants,
    })
  }

  /// All action ids in depth-first pre-order.
  pub fn depth_first(&self) -> Vec<ActionId> {
    let mut order = Vec::with_capacity(self.nodes.len());
    let mut stack: Vec<ActionId> = self.roots.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
      order.push(id);
      if let Some(node) = self.nodes.get(&id) {
        stack.extend(node.children.iter().rev().copied());
      }
    }
    order
  }

  /// Check that every parent resolves and every `on_success` edge stays
  /// inside its nesting scope.
  pub fn validate(&self) -> Result<(), GraphError> {
    for id in self.depth_first() {
      let Some(node) = self.nodes.get(&id) else {
        return Err(GraphError::NodeNotFound(id));
      };
      self.ancestors(node)?;

      if let Some(next) = node.on_success() {
        let target = self.nodes.get(&next).ok_or(GraphError::DanglingLink {
          from: id,
          to: next,
        })?;
        if target.parent_id() != node.parent_id() {
          return Err(GraphError::CrossScopeLink { from: id, to: next });
        }
      }
    }
    Ok(())
  }

  pub fn triggers(&self) -> &[TriggerRecord] {
    &self.triggers
  }

  pub fn trigger(&self, id: TriggerId) -> Option<&TriggerRecord> {
    self.triggers.iter().find(|t| t.id == id)
  }

  /// Position of a trigger.
  pub fn locate_trigger(&self, id: TriggerId) -> Result<usize, GraphError> {
    self
      .triggers
      .iter()
      .position(|t| t.id == id)
      .ok_or(GraphError::TriggerNotFound(id))
  }

  pub fn insert_trigger(&mut self, record: TriggerRecord) -> Result<usize, GraphError> {
    if self.trigger(record.id).is_some() {
      return Err(GraphError::DuplicateTrigger(record.id));
    }
    self.triggers.push(record);
    Ok(self.triggers.len() - 1)
  }

  pub fn replace_trigger(&mut self, record: TriggerRecord) -> Result<usize, GraphError> {
    let index = self.locate_trigger(record.id)?;
    self.triggers[index] = record;
    Ok(index)
  }

  fn collection(&self, scope: Scope) -> Result<&Vec<ActionId>, GraphError> {
    match scope {
      Scope::Root => Ok(&self.roots),
      Scope::Children(parent_id) => self
        .nodes
        .get(&parent_id)
        .map(|parent| &parent.children)
        .ok_or(GraphError::ParentNotFound(parent_id)),
    }
  }

  fn collection_mut(&mut self, scope: Scope) -> Result<&mut Vec<ActionId>, GraphError> {
    match scope {
      Scope::Root => Ok(&mut self.roots),
      Scope::Children(parent_id) => self
        .nodes
        .get_mut(&parent_id)
        .map(|parent| &mut parent.children)
        .ok_or(GraphError::ParentNotFound(parent_id)),
    }
  }

  fn ancestors(&self, node: &ActionNode) -> Result<Vec<ActionId>, GraphError> {
    let mut path = Vec::new();
    let mut current = node.parent_id();
    while let Some(parent_id) = current {
      let parent = self
        .nodes
        .get(&parent_id)
        .ok_or(GraphError::ParentNotFound(parent_id))?;
      path.push(parent_id);
      current = parent.parent_id();
    }
    path.reverse();
    Ok(path)
  }

  /// Place a record (and its nested body) at the end of `scope`.
  fn ingest(&mut self, scope: Scope, mut record: ActionRecord) -> Result<(), GraphError> {
    if self.nodes.contains_key(&record.id) {
      return Err(GraphError::DuplicateNode(record.id));
    }

    // The nesting structure decides the scope.
    if record.parent_id != scope.parent_id() {
      debug!(action_id = %record.id, "normalizing parent_id to enclosing container");
      record.parent_id = scope.parent_id();
    }

    let id = record.id;
    let body = std::mem::take(&mut record.actions);
    self.collection_mut(scope)?.push(id);
    self.nodes.insert(
      id,
      ActionNode {
        record,
        children: Vec::new(),
      },
    );

    for child in body {
      self.ingest(Scope::Children(id), child)?;
    }
    Ok(())
  }

  fn drop_subtree(&mut self, children: &[ActionId]) -> Vec<ActionId> {
    let mut dropped = Vec::new();
    let mut stack = children.to_vec();
    while let Some(id) = stack.pop() {
      if let Some(node) = self.nodes.remove(&id) {
        stack.extend(node.children);
        dropped.push(id);
      }
    }
    dropped
  }
}

/// Reject a record whose subtree repeats an id or reuses one already stored.
fn collect_ids(
  record: &ActionRecord,
  seen: &mut HashSet<ActionId>,
  existing: &HashMap<ActionId, ActionNode>,
) -> Result<(), GraphError> {
  if existing.contains_key(&record.id) || !seen.insert(record.id) {
    return Err(GraphError::DuplicateNode(record.id));
  }
  for child in &record.actions {
    collect_ids(child, seen, existing)?;
  }
  Ok(())
}
