use thiserror::Error;

/// Failure of a single resource call.
///
/// Cloneable so one failed fetch can be handed to every reader waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// The transport call itself failed (DNS, connect, timeout)
  #[error("network error: {0}")]
  Network(String),

  /// The server answered with a non-2xx status
  #[error("server responded with status {status}: {body}")]
  Response { status: u16, body: String },

  /// The body was not valid JSON or not the expected shape
  #[error("failed to parse response: {0}")]
  Parse(String),

  /// The owning scope went away before the call resolved
  #[error("request was cancelled")]
  Cancelled,
}

impl ApiError {
  /// Network failures and 5xx responses may succeed on a later attempt.
  pub fn is_retryable(&self) -> bool {
    match self {
      ApiError::Network(_) => true,
      ApiError::Response { status, .. } => *status >= 500,
      ApiError::Parse(_) | ApiError::Cancelled => false,
    }
  }

  /// HTTP status attached to a response error.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Response { status, .. } => Some(*status),
      _ => None,
    }
  }
}
