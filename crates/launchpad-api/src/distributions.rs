//! Handlers for `/distributions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/distributions` | `?status&tenantId&releaseId&limit&offset` |
//! | `POST` | `/distributions` | Body: [`NewDistribution`] |
//! | `GET`  | `/distributions/:id` | Distribution + current submissions |
//! | `GET`  | `/distributions/:id/submissions` | All rows, `?platform` |
//! | `POST` | `/distributions/:id/submissions` | Resubmission; JSON or multipart |

use axum::{
  extract::{FromRequest, Multipart, Request, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use launchpad_core::{
  Error as CoreError,
  artifact::ArtifactStore,
  distribution::{DistributionStatus, NewDistribution},
  platform::Platform,
  store::{DistributionQuery, SubmissionStore},
  submission::{ResubmitPayload, SubmitPayload},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{Actor, ApiJson, ApiPath, ApiQuery, Envelope},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub status:     Option<DistributionStatus>,
  pub tenant_id:  Option<String>,
  pub release_id: Option<Uuid>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// `GET /distributions`
pub async fn list<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let query = DistributionQuery {
    status:     params.status,
    tenant_id:  params.tenant_id,
    release_id: params.release_id,
    limit:      params.limit,
    offset:     params.offset,
  };
  Ok(Envelope::ok(svc.list_distributions(&query).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /distributions`
pub async fn create<S, A>(
  State(svc): State<AppState<S, A>>,
  _actor: Actor,
  ApiJson(body): ApiJson<NewDistribution>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let view = svc.create_distribution(body).await?;
  Ok((StatusCode::CREATED, Envelope::ok(view)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /distributions/:id`
pub async fn get_one<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  Ok(Envelope::ok(svc.get_distribution(id).await?))
}

// ─── Submissions ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlatformFilter {
  pub platform: Option<Platform>,
}

/// `GET /distributions/:id/submissions[?platform=IOS]`
pub async fn submissions<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(filter): ApiQuery<PlatformFilter>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  Ok(Envelope::ok(svc.list_submissions(id, filter.platform).await?))
}

/// `POST /distributions/:id/submissions`
///
/// Accepts a JSON resubmission body, or a multipart form with a `payload`
/// JSON part and an optional `artifact` file part. An uploaded artifact
/// becomes the Android payload's `artifactPath`.
pub async fn resubmit<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  Actor(actor): Actor,
  request: Request,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let is_multipart = request
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.starts_with("multipart/form-data"));

  let payload = if is_multipart {
    let multipart = Multipart::from_request(request, &()).await?;
    read_multipart(&svc, id, multipart).await?
  } else {
    let ApiJson(body) = ApiJson::<serde_json::Value>::from_request(request, &()).await?;
    ResubmitPayload::from_json(body)?
  };

  let submission = svc.create_new_submission(id, payload, &actor).await?;
  Ok((StatusCode::CREATED, Envelope::ok(submission)))
}

async fn read_multipart<S, A>(
  svc: &AppState<S, A>,
  distribution_id: Uuid,
  mut multipart: Multipart,
) -> Result<ResubmitPayload, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let mut payload = None;
  let mut artifact = None;

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().map(str::to_owned);
    match name.as_deref() {
      Some("payload") => {
        let text = field.text().await?;
        let value = serde_json::from_str(&text)
          .map_err(|e| CoreError::validation("payload", e.to_string()))?;
        payload = Some(ResubmitPayload::from_json(value)?);
      }
      Some("artifact") => {
        let file_name = field
          .file_name()
          .map(str::to_owned)
          .ok_or_else(|| CoreError::validation("artifact", "file name is required"))?;
        let bytes = field.bytes().await?;
        artifact = Some((file_name, bytes.to_vec()));
      }
      _ => {}
    }
  }

  let mut payload = payload.ok_or_else(|| CoreError::validation("payload", "is required"))?;
  if let Some((file_name, bytes)) = artifact {
    let SubmitPayload::Android(android) = &mut payload.payload else {
      return Err(CoreError::validation("artifact", "only Android submissions take an artifact").into());
    };
    let meta = svc
      .upload_artifact(distribution_id, Platform::Android, file_name, bytes)
      .await?;
    android.artifact_path = Some(meta.path);
  }
  Ok(payload)
}
