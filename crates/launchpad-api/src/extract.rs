//! Request extractors that reject with [`ApiError`] instead of axum's plain
//! text rejections.

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Path, Query},
  http::request::Parts,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

/// The authenticated caller, recorded as the actor of every transition.
///
/// Inserted into request extensions by the server's auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Actor>()
      .cloned()
      .ok_or(ApiError::Unauthorized)
  }
}

/// [`Json`] with envelope-shaped rejections.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// [`Query`] with envelope-shaped rejections.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// [`Path`] with envelope-shaped rejections.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Successful response body: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub success: bool,
  pub data:    T,
}

impl<T> Envelope<T> {
  pub fn ok(data: T) -> Self { Self { success: true, data } }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
  fn into_response(self) -> Response { Json(self).into_response() }
}
