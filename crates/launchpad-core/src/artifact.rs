//! The artifact-store collaborator.
//!
//! Build artifacts live outside the submission database. The core only keeps
//! a path to them and asks the collaborator for uploads and time-limited
//! download URLs, always outside a commit.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::platform::Platform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
  /// Store-relative path; what a submission's `artifactPath` refers to.
  pub path:         String,
  pub file_name:    String,
  pub size_bytes:   u64,
  /// SHA-256 hex digest of the artifact bytes.
  pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
  pub url:        String,
  pub expires_at: DateTime<Utc>,
}

/// An artifact upload, e.g. an Android `.aab` attached to a resubmission.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
  pub tenant_id:       String,
  pub distribution_id: Uuid,
  pub platform:        Platform,
  pub file_name:       String,
  pub bytes:           Vec<u8>,
}

pub trait ArtifactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upload_artifact(
    &self,
    upload: ArtifactUpload,
  ) -> impl Future<Output = Result<ArtifactMetadata, Self::Error>> + Send + '_;

  /// Metadata for a stored artifact, or `None` if nothing is stored at
  /// `path`.
  fn artifact_metadata(
    &self,
    path: String,
  ) -> impl Future<Output = Result<Option<ArtifactMetadata>, Self::Error>> + Send + '_;

  fn presigned_download_url(
    &self,
    path: String,
  ) -> impl Future<Output = Result<PresignedUrl, Self::Error>> + Send + '_;
}
