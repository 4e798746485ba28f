//! [`SubmissionService`], the public contract used by HTTP handlers and the
//! store-status webhook.
//!
//! Every mutation runs the same optimistic read-validate-write cycle: load
//! the submission, compute the next row with the state machine, and ask the
//! store to commit it conditionally on the revision that was read. A lost
//! race is retried from a fresh read, a bounded number of times.
//!
//! Collaborator calls (artifact uploads, download URLs) happen before or
//! after a commit, never inside one.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  now,
  aggregate::DistributionAggregator,
  artifact::{ArtifactMetadata, ArtifactStore, ArtifactUpload, PresignedUrl},
  distribution::{Distribution, DistributionView, NewDistribution},
  platform::Platform,
  rollout::RolloutController,
  signal::StoreStatusSignal,
  store::{CommitOutcome, CommittedTransition, DistributionQuery, SubmissionStore},
  submission::{ResubmitPayload, Submission, SubmissionDetails, SubmitPayload},
  transition::{SubmissionStateMachine, Transition, require_actor},
};

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Upper bound on transitions applied for one store-status report
/// (IN_REVIEW → APPROVED → LIVE → rollout sync).
const MAX_SIGNAL_STEPS: usize = 4;

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

fn artifact_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::ExternalDependency { dependency: "artifact store", source: Box::new(e) }
}

pub struct SubmissionService<S, A> {
  store:               Arc<S>,
  artifacts:           Arc<A>,
  max_commit_attempts: u32,
}

impl<S, A> Clone for SubmissionService<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:               Arc::clone(&self.store),
      artifacts:           Arc::clone(&self.artifacts),
      max_commit_attempts: self.max_commit_attempts,
    }
  }
}

impl<S, A> SubmissionService<S, A>
where
  S: SubmissionStore,
  A: ArtifactStore,
{
  pub fn new(store: Arc<S>, artifacts: Arc<A>) -> Self {
    Self { store, artifacts, max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS }
  }

  pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
    self.max_commit_attempts = attempts.max(1);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn artifacts(&self) -> &Arc<A> { &self.artifacts }

  // ── Distributions ─────────────────────────────────────────────────────────

  pub async fn create_distribution(&self, input: NewDistribution) -> Result<DistributionView> {
    input.validate()?;
    let view = self.store.create_distribution(input).await.map_err(store_err)?;
    tracing::info!(
      distribution_id = %view.distribution.distribution_id,
      release_id = %view.distribution.release_id,
      platforms = view.submissions.len(),
      "distribution created"
    );
    Ok(view)
  }

  /// The distribution with its current submissions. The status is
  /// recomputed from those submissions rather than trusted from the cache.
  pub async fn get_distribution(&self, distribution_id: Uuid) -> Result<DistributionView> {
    let mut distribution = self.load_distribution(distribution_id).await?;
    let submissions = self
      .store
      .current_submissions(distribution_id)
      .await
      .map_err(store_err)?;
    if DistributionAggregator::recompute(&mut distribution, &submissions, now()) {
      tracing::warn!(%distribution_id, "cached distribution status was stale");
    }
    Ok(DistributionView { distribution, submissions })
  }

  pub async fn list_distributions(&self, query: &DistributionQuery) -> Result<Vec<Distribution>> {
    self.store.list_distributions(query).await.map_err(store_err)
  }

  pub async fn list_submissions(
    &self,
    distribution_id: Uuid,
    platform: Option<Platform>,
  ) -> Result<Vec<Submission>> {
    self.load_distribution(distribution_id).await?;
    self
      .store
      .list_submissions(distribution_id, platform)
      .await
      .map_err(store_err)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn get_submission_details(&self, submission_id: Uuid) -> Result<SubmissionDetails> {
    let submission = self.load_submission(submission_id).await?;
    let history = self.store.get_history(submission_id).await.map_err(store_err)?;
    let artifact = match &submission.artifact_path {
      Some(path) => self
        .artifacts
        .artifact_metadata(path.clone())
        .await
        .map_err(artifact_err)?,
      None => None,
    };
    Ok(SubmissionDetails { submission, history, artifact })
  }

  pub async fn get_artifact_download_url(
    &self,
    submission_id: Uuid,
    platform: Platform,
    tenant_id: &str,
  ) -> Result<PresignedUrl> {
    let submission = self.load_submission(submission_id).await?;
    ensure_platform(&submission, platform)?;
    let distribution = self.load_distribution(submission.distribution_id).await?;
    // Report other tenants' submissions as missing.
    if distribution.tenant_id != tenant_id {
      return Err(Error::not_found(format!("submission {submission_id}")));
    }
    let path = submission
      .artifact_path
      .ok_or_else(|| Error::not_found(format!("artifact for submission {submission_id}")))?;
    self.artifacts.presigned_download_url(path).await.map_err(artifact_err)
  }

  pub async fn upload_artifact(
    &self,
    distribution_id: Uuid,
    platform: Platform,
    file_name: String,
    bytes: Vec<u8>,
  ) -> Result<ArtifactMetadata> {
    let distribution = self.load_distribution(distribution_id).await?;
    if !distribution.platforms.contains(&platform) {
      return Err(Error::validation(
        "platform",
        format!("{platform} is not a target of distribution {distribution_id}"),
      ));
    }
    if bytes.is_empty() {
      return Err(Error::validation("artifact", "is empty"));
    }
    let upload = ArtifactUpload {
      tenant_id: distribution.tenant_id,
      distribution_id,
      platform,
      file_name,
      bytes,
    };
    let meta = self.artifacts.upload_artifact(upload).await.map_err(artifact_err)?;
    tracing::info!(%distribution_id, path = %meta.path, size = meta.size_bytes, "artifact uploaded");
    Ok(meta)
  }

  // ── Submission lifecycle ──────────────────────────────────────────────────

  /// PENDING → IN_REVIEW.
  pub async fn submit_existing(
    &self,
    submission_id: Uuid,
    payload: SubmitPayload,
    actor: &str,
  ) -> Result<Submission> {
    let platform = payload.platform();
    self
      .mutate(submission_id, platform, actor, |_| Ok(Some(Transition::Submit(payload.clone()))))
      .await
      .map(|(s, _)| s)
  }

  /// Replace a rejected or cancelled submission with a new current one,
  /// submitted with `payload`.
  pub async fn create_new_submission(
    &self,
    distribution_id: Uuid,
    payload: ResubmitPayload,
    actor: &str,
  ) -> Result<Submission> {
    let actor = require_actor(actor)?;
    let platform = payload.platform();

    for attempt in 1..=self.max_commit_attempts {
      let distribution = self.load_distribution(distribution_id).await?;
      if !distribution.platforms.contains(&platform) {
        return Err(Error::validation(
          "platform",
          format!("{platform} is not a target of distribution {distribution_id}"),
        ));
      }

      let predecessor = self
        .store
        .current_submissions(distribution_id)
        .await
        .map_err(store_err)?
        .into_iter()
        .find(|s| s.platform() == platform)
        .ok_or_else(|| {
          Error::not_found(format!("current {platform} submission of {distribution_id}"))
        })?;
      if !predecessor.status.is_terminal() {
        return Err(Error::invalid_transition(format!(
          "a new {platform} submission requires the current one to be REJECTED or CANCELLED (currently {})",
          predecessor.status
        )));
      }

      let now = crate::now();
      let fresh = predecessor.successor(payload.version.clone(), now);
      let applied = SubmissionStateMachine::apply(
        &fresh,
        Transition::Submit(payload.payload.clone()),
        &actor,
        now,
      )?;

      let outcome = self
        .store
        .commit_resubmission(
          predecessor.submission_id,
          predecessor.revision,
          applied.submission,
          applied.entry,
        )
        .await
        .map_err(store_err)?;
      match outcome {
        CommitOutcome::Committed(committed) => {
          tracing::info!(
            %distribution_id,
            predecessor_id = %predecessor.submission_id,
            submission_id = %committed.submission.submission_id,
            "resubmission created"
          );
          audit(&committed);
          return Ok(committed.submission);
        }
        CommitOutcome::Conflict => {
          tracing::debug!(%distribution_id, attempt, "resubmission lost a race; retrying");
        }
      }
    }

    tracing::warn!(%distribution_id, "resubmission retries exhausted");
    Err(Error::conflict("distribution", distribution_id))
  }

  /// Manual APPROVED → LIVE.
  pub async fn release_submission(
    &self,
    submission_id: Uuid,
    platform: Platform,
    rollout_percentage: Option<f64>,
    actor: &str,
  ) -> Result<Submission> {
    self
      .mutate(submission_id, platform, actor, |_| {
        Ok(Some(Transition::Release { rollout_percentage }))
      })
      .await
      .map(|(s, _)| s)
  }

  /// IN_REVIEW → CANCELLED (iOS only).
  pub async fn cancel_submission(
    &self,
    submission_id: Uuid,
    platform: Platform,
    reason: &str,
    actor: &str,
  ) -> Result<Submission> {
    self
      .mutate(submission_id, platform, actor, |_| {
        Ok(Some(Transition::Cancel { reason: reason.to_owned() }))
      })
      .await
      .map(|(s, _)| s)
  }

  // ── Rollout controls ──────────────────────────────────────────────────────

  pub async fn update_rollout_percentage(
    &self,
    submission_id: Uuid,
    platform: Platform,
    rollout_percentage: f64,
    actor: &str,
  ) -> Result<Submission> {
    self
      .mutate(submission_id, platform, actor, |current| {
        RolloutController::update_percentage(current, rollout_percentage).map(Some)
      })
      .await
      .map(|(s, _)| s)
  }

  /// Pause an iOS phased release, or halt an Android staged rollout.
  pub async fn pause_rollout(
    &self,
    submission_id: Uuid,
    platform: Platform,
    reason: &str,
    actor: &str,
  ) -> Result<Submission> {
    self
      .mutate(submission_id, platform, actor, |current| {
        RolloutController::pause(current, reason).map(Some)
      })
      .await
      .map(|(s, _)| s)
  }

  pub async fn halt_rollout(
    &self,
    submission_id: Uuid,
    platform: Platform,
    reason: &str,
    actor: &str,
  ) -> Result<Submission> {
    self
      .mutate(submission_id, platform, actor, |current| {
        RolloutController::halt(current, reason).map(Some)
      })
      .await
      .map(|(s, _)| s)
  }

  pub async fn resume_rollout(
    &self,
    submission_id: Uuid,
    platform: Platform,
    actor: &str,
  ) -> Result<Submission> {
    self
      .mutate(submission_id, platform, actor, |current| {
        RolloutController::resume(current).map(Some)
      })
      .await
      .map(|(s, _)| s)
  }

  // ── Webhook ───────────────────────────────────────────────────────────────

  /// Apply an externally observed store state. Idempotent: reporting the
  /// state the submission already reflects writes nothing.
  pub async fn report_status(
    &self,
    submission_id: Uuid,
    platform: Platform,
    signal: StoreStatusSignal,
    actor: &str,
  ) -> Result<Submission> {
    let mut submission = self.load_submission(submission_id).await?;
    ensure_platform(&submission, platform)?;

    for _ in 0..MAX_SIGNAL_STEPS {
      let (next, changed) = self
        .mutate(submission_id, platform, actor, |current| signal.next_transition(current))
        .await?;
      submission = next;
      if !changed {
        break;
      }
    }
    Ok(submission)
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn load_submission(&self, submission_id: Uuid) -> Result<Submission> {
    self
      .store
      .get_submission(submission_id)
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::not_found(format!("submission {submission_id}")))
  }

  async fn load_distribution(&self, distribution_id: Uuid) -> Result<Distribution> {
    self
      .store
      .get_distribution(distribution_id)
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::not_found(format!("distribution {distribution_id}")))
  }

  /// The optimistic read-validate-write loop. `plan` picks the transition
  /// from a fresh read on every attempt; `None` means nothing to do.
  ///
  /// Returns the resulting submission and whether anything was committed.
  async fn mutate<F>(
    &self,
    submission_id: Uuid,
    platform: Platform,
    actor: &str,
    plan: F,
  ) -> Result<(Submission, bool)>
  where
    F: Fn(&Submission) -> Result<Option<Transition>> + Send + Sync,
  {
    require_actor(actor)?;

    for attempt in 1..=self.max_commit_attempts {
      let current = self.load_submission(submission_id).await?;
      ensure_platform(&current, platform)?;

      let Some(transition) = plan(&current)? else {
        return Ok((current, false));
      };
      let applied = SubmissionStateMachine::apply(&current, transition, actor, now())?;

      let outcome = self
        .store
        .commit_transition(current.revision, applied.submission, applied.entry)
        .await
        .map_err(store_err)?;
      match outcome {
        CommitOutcome::Committed(committed) => {
          audit(&committed);
          return Ok((committed.submission, true));
        }
        CommitOutcome::Conflict => {
          tracing::debug!(
            %submission_id,
            attempt,
            revision = current.revision,
            "submission changed underneath us; retrying"
          );
        }
      }
    }

    tracing::warn!(%submission_id, attempts = self.max_commit_attempts, "commit retries exhausted");
    Err(Error::conflict("submission", submission_id))
  }
}

fn ensure_platform(submission: &Submission, platform: Platform) -> Result<()> {
  if submission.platform() != platform {
    return Err(Error::validation(
      "platform",
      format!(
        "submission {} is {}, not {platform}",
        submission.submission_id,
        submission.platform()
      ),
    ));
  }
  Ok(())
}

/// Fire-and-forget audit event, emitted after the transaction committed.
fn audit(committed: &CommittedTransition) {
  tracing::info!(
    target: "launchpad::audit",
    submission_id = %committed.submission.submission_id,
    distribution_id = %committed.distribution.distribution_id,
    platform = %committed.submission.platform(),
    action = %committed.entry.action,
    actor = %committed.entry.actor,
    status = %committed.submission.status,
    rollout = committed.submission.rollout_percentage,
    distribution_status = %committed.distribution.status,
    "submission transition committed"
  );
}
