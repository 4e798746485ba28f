//! Handlers for `/submissions` endpoints.
//!
//! Every mutating route takes `?platform=ANDROID|IOS`; a mismatch with the
//! stored submission is a validation error.
//!
//! | Method  | Path | Body |
//! |---------|------|------|
//! | `GET`   | `/submissions/:id` | |
//! | `PUT`   | `/submissions/:id/submit` | platform-specific submit fields |
//! | `PATCH` | `/submissions/:id/release` | `{rolloutPercentage?}` |
//! | `PATCH` | `/submissions/:id/rollout` | `{rolloutPercentage}` |
//! | `PATCH` | `/submissions/:id/rollout/pause` | `{reason}` |
//! | `PATCH` | `/submissions/:id/rollout/halt` | `{reason}` |
//! | `PATCH` | `/submissions/:id/rollout/resume` | |
//! | `PATCH` | `/submissions/:id/cancel` | `{reason}` |
//! | `POST`  | `/submissions/:id/status` | store-status signal |
//! | `GET`   | `/submissions/:id/artifact` | (`?tenantId`) |

use axum::{extract::State, response::IntoResponse};
use launchpad_core::{
  artifact::ArtifactStore,
  platform::Platform,
  signal::StoreStatusSignal,
  store::SubmissionStore,
  submission::SubmitPayload,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{Actor, ApiJson, ApiPath, ApiQuery, Envelope},
};

#[derive(Debug, Deserialize)]
pub struct PlatformParam {
  pub platform: Platform,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactParams {
  pub platform:  Platform,
  pub tenant_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBody {
  #[serde(default)]
  pub rollout_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutBody {
  pub rollout_percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
  #[serde(default)]
  pub reason: String,
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /submissions/:id`
pub async fn get_one<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  Ok(Envelope::ok(svc.get_submission_details(id).await?))
}

/// `GET /submissions/:id/artifact?platform=…&tenantId=…`
pub async fn artifact_url<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(params): ApiQuery<ArtifactParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let url = svc
    .get_artifact_download_url(id, params.platform, &params.tenant_id)
    .await?;
  Ok(Envelope::ok(url))
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

/// `PUT /submissions/:id/submit?platform=…`
pub async fn submit<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let payload = SubmitPayload::from_json(platform, body)?;
  Ok(Envelope::ok(svc.submit_existing(id, payload, &actor).await?))
}

/// `PATCH /submissions/:id/release?platform=…`
pub async fn release<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<ReleaseBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let sub = svc
    .release_submission(id, platform, body.rollout_percentage, &actor)
    .await?;
  Ok(Envelope::ok(sub))
}

/// `PATCH /submissions/:id/cancel?platform=IOS`
pub async fn cancel<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<ReasonBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let sub = svc.cancel_submission(id, platform, &body.reason, &actor).await?;
  Ok(Envelope::ok(sub))
}

// ─── Rollout ──────────────────────────────────────────────────────────────────

/// `PATCH /submissions/:id/rollout?platform=…`
pub async fn update_rollout<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<RolloutBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let sub = svc
    .update_rollout_percentage(id, platform, body.rollout_percentage, &actor)
    .await?;
  Ok(Envelope::ok(sub))
}

/// `PATCH /submissions/:id/rollout/pause?platform=…`
pub async fn pause<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<ReasonBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let sub = svc.pause_rollout(id, platform, &body.reason, &actor).await?;
  Ok(Envelope::ok(sub))
}

/// `PATCH /submissions/:id/rollout/halt?platform=ANDROID`
pub async fn halt<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<ReasonBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  let sub = svc.halt_rollout(id, platform, &body.reason, &actor).await?;
  Ok(Envelope::ok(sub))
}

/// `PATCH /submissions/:id/rollout/resume?platform=…`
pub async fn resume<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  Ok(Envelope::ok(svc.resume_rollout(id, platform, &actor).await?))
}

// ─── Webhook ──────────────────────────────────────────────────────────────────

/// `POST /submissions/:id/status?platform=…`, body e.g.
/// `{"storeStatus":"LIVE","rolloutPercentage":5}`.
pub async fn report_status<S, A>(
  State(svc): State<AppState<S, A>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiQuery(PlatformParam { platform }): ApiQuery<PlatformParam>,
  Actor(actor): Actor,
  ApiJson(signal): ApiJson<StoreStatusSignal>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  tracing::debug!(submission_id = %id, %platform, ?signal, "store status reported");
  Ok(Envelope::ok(svc.report_status(id, platform, signal, &actor).await?))
}
