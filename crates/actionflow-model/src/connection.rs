use serde::{Deserialize, Serialize};

/// A saved provider connection (credentials live server-side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
  pub id: u64,
  pub name: String,
  /// Provider driver this connection authenticates, e.g. "slack".
  pub driver: String,
}
