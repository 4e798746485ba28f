//! Filesystem-backed [`ArtifactStore`] with signed, expiring download URLs.
//!
//! Artifacts are written under `root` as
//! `{tenant}/{distribution}/{platform}/{hash}-{file_name}`. Download URLs point
//! at the server's `/artifacts/{*path}` route and carry `expires` (unix
//! seconds) plus an HMAC-SHA256 `signature` over the path and expiry.

use std::{
  io::ErrorKind,
  path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use launchpad_core::artifact::{ArtifactMetadata, ArtifactStore, ArtifactUpload, PresignedUrl};
use sha2::{Digest, Sha256};

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Leading hex digits of the content hash used to keep uploads distinct.
const HASH_PREFIX_LEN: usize = 12;

#[derive(Clone)]
pub struct LocalArtifactStore {
  root:        PathBuf,
  base_url:    String,
  signing_key: Vec<u8>,
  ttl:         Duration,
}

impl std::fmt::Debug for LocalArtifactStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalArtifactStore")
      .field("root", &self.root)
      .field("base_url", &self.base_url)
      .finish_non_exhaustive()
  }
}

impl LocalArtifactStore {
  /// Open (creating if needed) an artifact directory at `root`.
  pub async fn open(
    root: impl Into<PathBuf>,
    base_url: impl Into<String>,
    signing_key: impl Into<Vec<u8>>,
    ttl: Duration,
  ) -> Result<Self, Error> {
    let root = root.into();
    tokio::fs::create_dir_all(&root).await?;
    Ok(Self {
      root,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      signing_key: signing_key.into(),
      ttl,
    })
  }

  /// Map a store-relative path onto the filesystem, refusing anything that
  /// could escape `root`.
  fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
    let relative = Path::new(path);
    if path.is_empty()
      || !relative.components().all(|c| matches!(c, Component::Normal(_)))
    {
      return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(self.root.join(relative))
  }

  fn mac(&self, path: &str, expires: i64) -> Result<HmacSha256, Error> {
    let mut mac =
      HmacSha256::new_from_slice(&self.signing_key).map_err(|_| Error::InvalidSignature)?;
    mac.update(path.as_bytes());
    mac.update(b"\n");
    mac.update(expires.to_string().as_bytes());
    Ok(mac)
  }

  /// Hex signature for `path` valid until `expires`.
  pub fn sign(&self, path: &str, expires: i64) -> Result<String, Error> {
    Ok(hex::encode(self.mac(path, expires)?.finalize().into_bytes()))
  }

  /// Whether `signature` authorizes downloading `path` at `now`.
  pub fn verify(&self, path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
    if expires < now.timestamp() {
      return false;
    }
    let Ok(bytes) = hex::decode(signature) else {
      return false;
    };
    self
      .mac(path, expires)
      .is_ok_and(|mac| mac.verify_slice(&bytes).is_ok())
  }

  /// Signed URL for `path` expiring `ttl` after `now`.
  pub fn signed_url(&self, path: &str, now: DateTime<Utc>) -> Result<PresignedUrl, Error> {
    let expires_at = now + self.ttl;
    let expires = expires_at.timestamp();
    let signature = self.sign(path, expires)?;
    Ok(PresignedUrl {
      url: format!("{}/artifacts/{path}?expires={expires}&signature={signature}", self.base_url),
      expires_at,
    })
  }

  /// Read a stored artifact's bytes.
  pub async fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
    let full = self.resolve(path)?;
    match tokio::fs::read(&full).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound),
      Err(e) => Err(e.into()),
    }
  }
}

/// Reduce `segment` to a single safe path component.
fn sanitize(segment: &str) -> String {
  let cleaned = segment
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect::<String>()
    .replace("..", "_");
  let cleaned = cleaned.trim_start_matches('.');
  if cleaned.is_empty() { "_".to_string() } else { cleaned.to_string() }
}

fn content_hash(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

impl ArtifactStore for LocalArtifactStore {
  type Error = Error;

  async fn upload_artifact(&self, upload: ArtifactUpload) -> Result<ArtifactMetadata, Error> {
    let hash = content_hash(&upload.bytes);
    let file_name = sanitize(&upload.file_name);
    let path = format!(
      "{}/{}/{}/{}-{file_name}",
      sanitize(&upload.tenant_id),
      upload.distribution_id,
      upload.platform.as_ref().to_ascii_lowercase(),
      &hash[..HASH_PREFIX_LEN],
    );

    let full = self.resolve(&path)?;
    if let Some(parent) = full.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&full, &upload.bytes).await?;

    tracing::debug!(%path, size_bytes = upload.bytes.len(), "wrote artifact to disk");
    Ok(ArtifactMetadata {
      path,
      file_name,
      size_bytes: upload.bytes.len() as u64,
      content_hash: hash,
    })
  }

  async fn artifact_metadata(&self, path: String) -> Result<Option<ArtifactMetadata>, Error> {
    let bytes = match self.read(&path).await {
      Ok(bytes) => bytes,
      Err(Error::NotFound | Error::InvalidPath(_)) => return Ok(None),
      Err(e) => return Err(e),
    };
    let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
    Ok(Some(ArtifactMetadata {
      size_bytes: bytes.len() as u64,
      content_hash: content_hash(&bytes),
      file_name,
      path,
    }))
  }

  async fn presigned_download_url(&self, path: String) -> Result<PresignedUrl, Error> {
    self.resolve(&path)?;
    self.signed_url(&path, Utc::now())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use launchpad_core::platform::Platform;
  use uuid::Uuid;

  async fn store(dir: &tempfile::TempDir) -> LocalArtifactStore {
    LocalArtifactStore::open(dir.path(), "http://localhost:8080/", "k3y", Duration::hours(1))
      .await
      .unwrap()
  }

  fn upload(file_name: &str, bytes: &[u8]) -> ArtifactUpload {
    ArtifactUpload {
      tenant_id:       "acme".to_string(),
      distribution_id: Uuid::nil(),
      platform:        Platform::Android,
      file_name:       file_name.to_string(),
      bytes:           bytes.to_vec(),
    }
  }

  #[tokio::test]
  async fn upload_then_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    let meta = store.upload_artifact(upload("app-release.aab", b"bundle")).await.unwrap();
    assert!(meta.path.starts_with(&format!("acme/{}/android/", Uuid::nil())));
    assert!(meta.path.ends_with("-app-release.aab"));
    assert_eq!(meta.size_bytes, 6);
    assert_eq!(meta.content_hash, content_hash(b"bundle"));

    let found = store.artifact_metadata(meta.path.clone()).await.unwrap().unwrap();
    assert_eq!(found.content_hash, meta.content_hash);
    assert_eq!(found.size_bytes, 6);
  }

  #[tokio::test]
  async fn hostile_file_names_stay_inside_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    let meta = store.upload_artifact(upload("../../etc/passwd", b"x")).await.unwrap();
    assert!(!meta.path.contains(".."));
    assert!(dir.path().join(&meta.path).exists());
  }

  #[tokio::test]
  async fn traversal_paths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    assert!(matches!(store.read("../secret").await, Err(Error::InvalidPath(_))));
    assert!(matches!(store.read("/etc/passwd").await, Err(Error::InvalidPath(_))));
    assert!(store.artifact_metadata("a/../../b".to_string()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn missing_artifact_has_no_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    assert!(store.artifact_metadata("acme/none.aab".to_string()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn signatures_bind_path_and_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    let now = Utc::now();
    let expires = now.timestamp() + 60;
    let sig = store.sign("acme/app.aab", expires).unwrap();

    assert!(store.verify("acme/app.aab", expires, &sig, now));
    assert!(!store.verify("acme/other.aab", expires, &sig, now));
    assert!(!store.verify("acme/app.aab", expires + 1, &sig, now));
    assert!(!store.verify("acme/app.aab", expires, "zz", now));
    assert!(!store.verify("acme/app.aab", expires, &sig, now + Duration::minutes(2)));
  }

  #[tokio::test]
  async fn signed_url_shape() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    let now = Utc::now();

    let url = store.signed_url("acme/app.aab", now).unwrap();
    assert_eq!(url.expires_at, now + Duration::hours(1));
    assert!(url.url.starts_with("http://localhost:8080/artifacts/acme/app.aab?expires="));
    assert!(url.url.contains("&signature="));
  }
}
