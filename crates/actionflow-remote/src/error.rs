use std::path::PathBuf;

use thiserror::Error;

/// A failure before any response envelope was available.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid endpoint url: {0}")]
  Url(#[from] url::ParseError),

  /// Non-success status whose body is not an envelope.
  #[error("unexpected response status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("failed to decode response envelope: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("remote store unavailable: {0}")]
  Unavailable(String),

  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Errors loading or validating the client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("failed to parse config file {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    source: serde_json::Error,
  },

  #[error("invalid base url {url:?}: {source}")]
  InvalidBaseUrl {
    url: String,
    source: url::ParseError,
  },

  #[error("unsupported base url scheme: {0}")]
  UnsupportedScheme(String),
}
