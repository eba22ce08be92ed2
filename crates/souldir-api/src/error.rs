//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use souldir_core::store::AsCoreError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a backend failure onto the HTTP taxonomy. Domain errors keep their
  /// meaning (409 for conflicts, 404 for absence); everything else is a 500.
  pub fn from_store<E>(error: E) -> Self
  where
    E: std::error::Error + AsCoreError + Send + Sync + 'static,
  {
    use souldir_core::Error as Core;
    match error.as_core() {
      Some(Core::InvalidIdentifier(_) | Core::InvalidVersionFormat(_)) => {
        Self::BadRequest(error.to_string())
      }
      Some(
        Core::NamespaceConflict { .. } | Core::VersionAlreadyExists { .. },
      ) => Self::Conflict(error.to_string()),
      Some(Core::SoulNotFound(_) | Core::VersionNotFound { .. }) => {
        Self::NotFound(error.to_string())
      }
      Some(Core::PermissionDenied(_)) => Self::Forbidden(error.to_string()),
      _ => Self::Store(Box::new(error)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
