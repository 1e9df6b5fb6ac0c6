use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Connection settings for the remote workflow store.
///
/// ```json
/// {
///   "base_url": "https://flows.example.com/api/v1",
///   "token": "…",
///   "timeout_ms": 10000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// Root of the store's API; endpoint paths are resolved against it.
  pub base_url: String,
  /// Bearer token attached to every request.
  pub token: Option<String>,
  /// Per-request timeout. `None` leaves requests unbounded.
  pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000/api/v1".to_string(),
      token: None,
      timeout_ms: Some(30_000),
    }
  }
}

impl ClientConfig {
  /// Load a config file. A missing file yields the defaults.
  pub async fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// The base URL, normalized to end in `/` so relative joins keep the
  /// API prefix.
  pub fn base_url(&self) -> Result<Url, ConfigError> {
    let mut raw = self.base_url.trim().to_string();
    if !raw.ends_with('/') {
      raw.push('/');
    }

    let url = Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl {
      url: self.base_url.clone(),
      source,
    })?;

    match url.scheme() {
      "http" | "https" => Ok(url),
      other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
  }
}
