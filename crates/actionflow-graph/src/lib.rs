//! Actionflow Graph
//!
//! This crate holds the in-memory model of one workflow being edited: its
//! triggers and its tree of actions. Container actions (iterations) own an
//! ordered body of child actions, and siblings are chained by their
//! `on_success` edge.
//!
//! Key properties of [`GraphStore`]:
//! - Actions are kept in a flat map keyed by id; each node lists its children
//!   by id and points at its parent by id, so there is no cyclic ownership
//! - Every lookup goes through [`GraphStore::locate`], which reports the
//!   nesting scope, the index inside it and the ancestor path
//! - Removing an action clears dangling `on_success` edges in its own scope
//! - [`GraphStore::snapshot`] hands out an independent copy with provider
//!   detail objects stripped, for display

mod error;
mod snapshot;
mod store;

pub use error::GraphError;
pub use store::{ActionNode, GraphStore, Located, Removed, Scope};
