//! Actionflow Remote
//!
//! This crate provides the [`RemoteStore`] trait, the capability through which
//! the editor talks to the authoritative workflow store, along with two
//! implementations:
//! - [`HttpRemoteStore`] speaks the store's JSON API over HTTP
//! - [`MemoryRemoteStore`] keeps everything in process, with scripted faults
//!   and held responses for exercising failure paths and races
//!
//! Every operation resolves to an [`Envelope`] (the store answered, possibly
//! with a rejection) or a [`RemoteError`] (no envelope could be obtained).

mod config;
mod error;
mod http;
mod memory;

pub use config::ClientConfig;
pub use error::{ConfigError, RemoteError};
pub use http::HttpRemoteStore;
pub use memory::{Fault, Hold, MemoryRemoteStore, Operation, RemoteCall};

use actionflow_model::{
  ActionId, ActionPayload, ActionRecord, Connection, Envelope, TriggerId, TriggerPayload,
  TriggerRecord, WorkflowId, WorkflowPayload, WorkflowQuery, WorkflowRecord,
};
use async_trait::async_trait;

/// Operations offered by the authoritative workflow store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
  /// List workflows, embedding and counting the relations named in `query`.
  async fn list_workflows(
    &self,
    query: &WorkflowQuery,
  ) -> Result<Envelope<Vec<WorkflowRecord>>, RemoteError>;

  async fn create_workflow(
    &self,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError>;

  async fn update_workflow(
    &self,
    workflow_id: WorkflowId,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError>;

  async fn delete_workflow(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError>;

  /// The nested action tree of one workflow.
  async fn list_actions(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<Vec<ActionRecord>>, RemoteError>;

  async fn create_action(
    &self,
    workflow_id: WorkflowId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError>;

  async fn update_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError>;

  async fn delete_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError>;

  async fn create_trigger(
    &self,
    workflow_id: WorkflowId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError>;

  async fn update_trigger(
    &self,
    workflow_id: WorkflowId,
    trigger_id: TriggerId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError>;

  /// Saved provider connections.
  async fn list_connections(&self) -> Result<Envelope<Vec<Connection>>, RemoteError>;
}
