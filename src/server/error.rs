use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};

use crate::types::ValidationError;

/// Handler failure, rendered as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
  BadRequest(String),
  NotFound(String),
  /// Store or parse failure. `message` goes to the caller, `source` only to the log.
  Internal {
    message: &'static str,
    source: anyhow::Error,
  },
  /// The upstream origin could not be reached or answered badly
  Upstream(String),
}

impl ApiError {
  pub fn internal(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
    Self::Internal {
      message,
      source: source.into(),
    }
  }
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self {
    Self::BadRequest(e.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, msg) = match self {
      Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      Self::Internal { message, source } => {
        tracing::error!("{}: {:#}", message, source);
        (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
      }
      Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
    };
    (status, Json(serde_json::json!({ "error": msg }))).into_response()
  }
}
