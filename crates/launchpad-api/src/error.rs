//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as
//! `{"success": false, "error": {"message", "code", "details"?}}`.

use axum::{
  Json,
  extract::{
    multipart::{MultipartError, MultipartRejection},
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::{IntoResponse, Response},
};
use launchpad_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  /// The request could not be decoded. `field` names the part that failed
  /// (`body`, `query`, `path`, ...).
  #[error("bad request: {message}")]
  BadRequest { field: &'static str, message: String },

  /// The request body exceeded the route's body limit.
  #[error("payload too large: {0}")]
  PayloadTooLarge(String),

  #[error("unauthorized")]
  Unauthorized,
}

impl ApiError {
  fn bad_request(field: &'static str, message: impl ToString) -> Self {
    Self::BadRequest { field, message: message.to_string() }
  }

  /// A body rejection, which is either an oversized body or a malformed one.
  fn body(status: StatusCode, message: String) -> Self {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
      Self::PayloadTooLarge(message)
    } else {
      Self::bad_request("body", message)
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::body(rejection.status(), rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::bad_request("query", rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::bad_request("path", rejection.body_text()) }
}

impl From<MultipartRejection> for ApiError {
  fn from(rejection: MultipartRejection) -> Self {
    Self::body(rejection.status(), rejection.body_text())
  }
}

impl From<MultipartError> for ApiError {
  fn from(err: MultipartError) -> Self { Self::body(err.status(), err.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, field) = match &self {
      ApiError::Core(e) => {
        let status = match e {
          CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
          CoreError::InvalidTransition(_) | CoreError::Conflict { .. } => StatusCode::CONFLICT,
          CoreError::NotFound(_) => StatusCode::NOT_FOUND,
          CoreError::Authorization(_) => StatusCode::UNAUTHORIZED,
          CoreError::ExternalDependency { .. } | CoreError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
          }
        };
        let field = match e {
          CoreError::Validation { field, .. } => Some(field.as_str()),
          _ => None,
        };
        (status, e.code(), field)
      }
      ApiError::BadRequest { field, .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", Some(*field)),
      ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", None),
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", None),
    };

    if status.is_server_error() {
      tracing::error!(error = %self, code, "request failed");
    }

    let mut error = json!({ "message": self.to_string(), "code": code });
    if let Some(field) = field {
      error["details"] = json!({ "field": field });
    }
    (status, Json(json!({ "success": false, "error": error }))).into_response()
  }
}
