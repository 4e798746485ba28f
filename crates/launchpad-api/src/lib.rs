//! JSON REST API for Launchpad.
//!
//! Exposes an axum [`Router`] backed by a [`SubmissionService`] over any
//! [`SubmissionStore`] and [`ArtifactStore`]. Authentication, TLS, and
//! transport concerns are the caller's responsibility; the caller must put an
//! [`Actor`] into each authenticated request's extensions.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", launchpad_api::api_router(service.clone(), DEFAULT_MAX_UPLOAD_BYTES))
//! ```

pub mod distributions;
pub mod error;
pub mod extract;
pub mod submissions;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, patch, post, put},
};
use launchpad_core::{artifact::ArtifactStore, service::SubmissionService, store::SubmissionStore};

pub use error::ApiError;
pub use extract::Actor;

/// Shared handler state.
pub type AppState<S, A> = Arc<SubmissionService<S, A>>;

/// Body limit for resubmissions that carry an artifact upload (512 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type. `max_upload_bytes` caps the resubmission body;
/// every other route keeps axum's default limit.
pub fn api_router<S, A>(service: SubmissionService<S, A>, max_upload_bytes: usize) -> Router<()>
where
  S: SubmissionStore + 'static,
  A: ArtifactStore + 'static,
{
  Router::new()
    // Distributions
    .route(
      "/distributions",
      get(distributions::list::<S, A>).post(distributions::create::<S, A>),
    )
    .route("/distributions/{id}", get(distributions::get_one::<S, A>))
    .route(
      "/distributions/{id}/submissions",
      get(distributions::submissions::<S, A>)
        .post(distributions::resubmit::<S, A>)
        .layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
    // Submissions
    .route("/submissions/{id}", get(submissions::get_one::<S, A>))
    .route("/submissions/{id}/submit", put(submissions::submit::<S, A>))
    .route("/submissions/{id}/release", patch(submissions::release::<S, A>))
    .route("/submissions/{id}/cancel", patch(submissions::cancel::<S, A>))
    .route("/submissions/{id}/rollout", patch(submissions::update_rollout::<S, A>))
    .route("/submissions/{id}/rollout/pause", patch(submissions::pause::<S, A>))
    .route("/submissions/{id}/rollout/halt", patch(submissions::halt::<S, A>))
    .route("/submissions/{id}/rollout/resume", patch(submissions::resume::<S, A>))
    .route("/submissions/{id}/artifact", get(submissions::artifact_url::<S, A>))
    // Store-status webhook
    .route("/submissions/{id}/status", post(submissions::report_status::<S, A>))
    .with_state(Arc::new(service))
}

#[cfg(test)]
mod tests;
