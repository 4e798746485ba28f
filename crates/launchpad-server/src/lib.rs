//! HTTP server for Launchpad.
//!
//! Mounts the JSON API under `/api` behind Basic auth and serves stored
//! artifacts from `/artifacts/{*path}` to holders of a signed URL.

pub mod artifact;
pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  path::{Path as FsPath, PathBuf},
  sync::Arc,
};

use axum::{
  Router,
  extract::{Path, Query, State},
  http::header,
  middleware,
  response::IntoResponse,
  routing::get,
};
use chrono::Utc;
use launchpad_core::{service::SubmissionService, store::SubmissionStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use artifact::LocalArtifactStore;
use auth::{AuthConfig, UserConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LAUNCHPAD_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  /// Externally reachable origin, used to build download URLs.
  pub public_base_url:       String,
  pub store_path:            PathBuf,
  pub artifact_dir:          PathBuf,
  pub download_signing_key:  String,
  pub download_url_ttl_secs: i64,
  pub max_commit_attempts:   u32,
  /// Body limit for resubmissions carrying an artifact upload.
  pub max_upload_bytes:      usize,
  #[serde(default)]
  pub users:                 Vec<UserConfig>,
}

impl ServerConfig {
  /// Load from `path` (optional) layered with `LAUNCHPAD_*` variables.
  pub fn load(path: &FsPath) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("public_base_url", "http://127.0.0.1:8080")?
      .set_default("store_path", "~/.local/share/launchpad/launchpad.db")?
      .set_default("artifact_dir", "~/.local/share/launchpad/artifacts")?
      .set_default("download_url_ttl_secs", 900)?
      .set_default("max_commit_attempts", 3)?
      .set_default("max_upload_bytes", launchpad_api::DEFAULT_MAX_UPLOAD_BYTES as i64)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("LAUNCHPAD"))
      .build()?
      .try_deserialize()
  }

  pub fn auth(&self) -> AuthConfig { AuthConfig { users: self.users.clone() } }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server [`Router`].
pub fn router<S>(
  service: SubmissionService<S, LocalArtifactStore>,
  auth: AuthConfig,
  max_upload_bytes: usize,
) -> Router
where
  S: SubmissionStore + 'static,
{
  let artifacts = Arc::clone(service.artifacts());
  let api = launchpad_api::api_router(service, max_upload_bytes)
    .layer(middleware::from_fn_with_state(Arc::new(auth), auth::require_auth));

  Router::new()
    .route("/artifacts/{*path}", get(download))
    .with_state(artifacts)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct SignedQuery {
  expires:   i64,
  signature: String,
}

/// `GET /artifacts/{*path}?expires=…&signature=…`
async fn download(
  State(artifacts): State<Arc<LocalArtifactStore>>,
  Path(path): Path<String>,
  Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, Error> {
  if !artifacts.verify(&path, query.expires, &query.signature, Utc::now()) {
    tracing::debug!(%path, "rejected artifact download");
    return Err(Error::InvalidSignature);
  }
  let bytes = artifacts.read(&path).await?;
  let file_name = path.rsplit('/').next().unwrap_or(&path);
  Ok((
    [
      (header::CONTENT_TYPE, "application/octet-stream".to_string()),
      (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
    ],
    bytes,
  ))
}
