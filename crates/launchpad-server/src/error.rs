//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use launchpad_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("not found")]
  NotFound,
  #[error("download link is invalid or has expired")]
  InvalidSignature,
  #[error("invalid artifact path: {0}")]
  InvalidPath(String),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      // Same envelope as the API so clients see one error shape.
      Error::Unauthorized => {
        let mut res = ApiError::Unauthorized.into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"launchpad\""),
        );
        res
      }
      Error::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
      Error::InvalidSignature => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
      Error::InvalidPath(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Io(e) => {
        tracing::error!(error = %e, "artifact io failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
      }
    }
  }
}
