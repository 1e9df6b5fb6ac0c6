use serde::{Deserialize, Serialize};

/// Response wrapper used by every remote store operation.
///
/// `success == false` means the store rejected the request; `message`
/// explains why. A successful envelope normally carries `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
  pub success: bool,
  #[serde(default = "no_data", skip_serializing_if = "Option::is_none")]
  pub data: Option<T>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

// A plain `default` would add a `T: Default` bound to the derived impl.
fn no_data<T>() -> Option<T> {
  None
}

impl<T> Envelope<T> {
  /// A successful envelope carrying `data`.
  pub fn ok(data: T) -> Self {
    Self {
      success: true,
      data: Some(data),
      message: None,
    }
  }

  /// A rejection carrying the store's message.
  pub fn rejected(message: impl Into<String>) -> Self {
    Self {
      success: false,
      data: None,
      message: Some(message.into()),
    }
  }

  /// Split the envelope into its data or the rejection message.
  ///
  /// A success without data yields `Ok(None)`.
  pub fn into_result(self) -> Result<Option<T>, String> {
    if self.success {
      Ok(self.data)
    } else {
      Err(
        self
          .message
          .unwrap_or_else(|| "request rejected without a message".to_string()),
      )
    }
  }
}
