//! HTTP Basic-auth middleware and standalone verifier.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use launchpad_api::Actor;
use rand_core::OsRng;
use serde::Deserialize;

use crate::error::Error;

/// One account allowed to call the API.
#[derive(Clone, Debug, Deserialize)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Credentials accepted as valid for this server instance.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
  pub users: Vec<UserConfig>,
}

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Verify Basic credentials from `headers` and return the username.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let user = config
    .users
    .iter()
    .find(|u| u.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(user.username.clone())
}

/// Reject unauthenticated requests; otherwise attach the caller as the
/// request's [`Actor`].
pub async fn require_auth(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let username = verify_auth(req.headers(), &auth).inspect_err(|_| {
    tracing::debug!(path = %req.uri().path(), "rejected unauthenticated request");
  })?;
  req.extensions_mut().insert(Actor(username));
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, header};

  fn config(password: &str) -> AuthConfig {
    AuthConfig {
      users: vec![
        UserConfig {
          username:      "release-bot".to_string(),
          password_hash: hash_password("other").unwrap(),
        },
        UserConfig {
          username:      "alice".to_string(),
          password_hash: hash_password(password).unwrap(),
        },
      ],
    }
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let encoded = B64.encode(format!("{user}:{pass}"));
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    headers
  }

  #[test]
  fn correct_credentials_yield_username() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&basic("alice", "secret"), &cfg).unwrap(), "alice");
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&basic("alice", "wrong"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn password_of_another_user_is_rejected() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&basic("alice", "other"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&basic("mallory", "secret"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(matches!(verify_auth(&headers, &cfg), Err(Error::Unauthorized)));
  }
}
