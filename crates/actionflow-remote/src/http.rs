use std::time::Duration;

use actionflow_model::{
  ActionId, ActionPayload, ActionRecord, Connection, Envelope, TriggerId, TriggerPayload,
  TriggerRecord, WIRE_VERSION, WorkflowId, WorkflowPayload, WorkflowQuery, WorkflowRecord,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::RemoteStore;
use crate::config::ClientConfig;
use crate::error::RemoteError;

/// Header carrying the wire contract version on every request.
const WIRE_VERSION_HEADER: &str = "x-actionflow-wire-version";

/// Remote store reached over the store's JSON HTTP API.
///
/// Endpoints, relative to the configured base URL:
/// ```text
/// GET    workflows?with=…&with_count=…
/// POST   workflows
/// PUT    workflows/{id}
/// DELETE workflows/{id}
/// GET    workflows/{id}/actions?with=action.app&with_count=actions
/// POST   workflows/{id}/actions
/// PUT    workflows/{id}/actions/{action_id}
/// DELETE workflows/{id}/actions/{action_id}
/// POST   workflows/{id}/triggers
/// PUT    workflows/{id}/triggers/{trigger_id}
/// GET    connections
/// ```
pub struct HttpRemoteStore {
  client: Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpRemoteStore {
  pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
    let base_url = config.base_url()?;

    let mut builder = Client::builder();
    if let Some(timeout_ms) = config.timeout_ms {
      builder = builder.timeout(Duration::from_millis(timeout_ms));
    }

    Ok(Self {
      client: builder.build()?,
      base_url,
      token: config.token.clone(),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
    Ok(self.base_url.join(path)?)
  }

  /// Send a request and decode the envelope.
  ///
  /// Error statuses still carry an envelope when the store rejects a request
  /// (validation failures); only bodies that are not envelopes become a
  /// [`RemoteError`].
  async fn send<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
  ) -> Result<Envelope<T>, RemoteError> {
    let mut request = request
      .header(reqwest::header::ACCEPT, "application/json")
      .header(WIRE_VERSION_HEADER, WIRE_VERSION);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    debug!(status = status.as_u16(), bytes = body.len(), "remote store responded");

    match serde_json::from_str::<Envelope<T>>(&body) {
      Ok(envelope) => Ok(envelope),
      Err(_) if !status.is_success() => Err(RemoteError::Status {
        status: status.as_u16(),
        body,
      }),
      Err(e) => Err(RemoteError::Decode(e)),
    }
  }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
  async fn list_workflows(
    &self,
    query: &WorkflowQuery,
  ) -> Result<Envelope<Vec<WorkflowRecord>>, RemoteError> {
    let url = self.endpoint("workflows")?;
    debug!(%url, "listing workflows");
    self
      .send(self.client.get(url).query(&query.to_pairs()))
      .await
  }

  async fn create_workflow(
    &self,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError> {
    let url = self.endpoint("workflows")?;
    debug!(%url, "creating workflow");
    self.send(self.client.post(url).json(payload)).await
  }

  async fn update_workflow(
    &self,
    workflow_id: WorkflowId,
    payload: &WorkflowPayload,
  ) -> Result<Envelope<WorkflowRecord>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}"))?;
    debug!(%url, "updating workflow");
    self.send(self.client.put(url).json(payload)).await
  }

  async fn delete_workflow(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}"))?;
    debug!(%url, "deleting workflow");
    self.send(self.client.delete(url)).await
  }

  async fn list_actions(
    &self,
    workflow_id: WorkflowId,
  ) -> Result<Envelope<Vec<ActionRecord>>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}/actions"))?;
    debug!(%url, "listing actions");
    self
      .send(
        self
          .client
          .get(url)
          .query(&[("with", "action.app"), ("with_count", "actions")]),
      )
      .await
  }

  async fn create_action(
    &self,
    workflow_id: WorkflowId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}/actions"))?;
    debug!(%url, "creating action");
    self.send(self.client.post(url).json(payload)).await
  }

  async fn update_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
    payload: &ActionPayload,
  ) -> Result<Envelope<ActionRecord>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}/actions/{action_id}"))?;
    debug!(%url, "updating action");
    self.send(self.client.put(url).json(payload)).await
  }

  async fn delete_action(
    &self,
    workflow_id: WorkflowId,
    action_id: ActionId,
  ) -> Result<Envelope<serde_json::Value>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}/actions/{action_id}"))?;
    debug!(%url, "deleting action");
    self.send(self.client.delete(url)).await
  }

  async fn create_trigger(
    &self,
    workflow_id: WorkflowId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}/triggers"))?;
    debug!(%url, "creating trigger");
    self.send(self.client.post(url).json(payload)).await
  }

  async fn update_trigger(
    &self,
    workflow_id: WorkflowId,
    trigger_id: TriggerId,
    payload: &TriggerPayload,
  ) -> Result<Envelope<TriggerRecord>, RemoteError> {
    let url = self.endpoint(&format!("workflows/{workflow_id}/triggers/{trigger_id}"))?;
    debug!(%url, "updating trigger");
    self.send(self.client.put(url).json(payload)).await
  }

  async fn list_connections(&self) -> Result<Envelope<Vec<Connection>>, RemoteError> {
    let url = self.endpoint("connections")?;
    debug!(%url, "listing connections");
    self.send(self.client.get(url)).await
  }
}
