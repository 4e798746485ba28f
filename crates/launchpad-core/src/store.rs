//! The `SubmissionStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `launchpad-store-sqlite`). Higher layers depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  distribution::{Distribution, DistributionStatus, DistributionView, NewDistribution},
  history::{ActionHistoryEntry, NewHistoryEntry},
  platform::Platform,
  submission::Submission,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`SubmissionStore::list_distributions`]. Filters on the
/// cached status column.
#[derive(Debug, Clone, Default)]
pub struct DistributionQuery {
  pub status:     Option<DistributionStatus>,
  pub tenant_id:  Option<String>,
  pub release_id: Option<Uuid>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

// ─── Commit outcome ──────────────────────────────────────────────────────────

/// Everything one committed transaction wrote.
#[derive(Debug, Clone)]
pub struct CommittedTransition {
  pub submission:   Submission,
  pub distribution: Distribution,
  pub entry:        ActionHistoryEntry,
}

#[derive(Debug, Clone)]
pub enum CommitOutcome {
  Committed(CommittedTransition),
  /// The row's revision no longer matched (or it stopped being current);
  /// nothing was written.
  Conflict,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a submission store backend.
///
/// Every write method is a single transaction: the submission row(s), the
/// history entry, and the distribution's recomputed status commit together
/// or not at all. History is append-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SubmissionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Distributions ─────────────────────────────────────────────────────

  /// Persist a new distribution with one PENDING current submission per
  /// target, and its initial computed status.
  fn create_distribution(
    &self,
    input: NewDistribution,
  ) -> impl Future<Output = Result<DistributionView, Self::Error>> + Send + '_;

  fn get_distribution(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Distribution>, Self::Error>> + Send + '_;

  fn list_distributions<'a>(
    &'a self,
    query: &'a DistributionQuery,
  ) -> impl Future<Output = Result<Vec<Distribution>, Self::Error>> + Send + 'a;

  // ── Submissions ───────────────────────────────────────────────────────

  fn get_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  /// The `is_current` submissions of a distribution, one per platform.
  fn current_submissions(
    &self,
    distribution_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  /// Every submission of a distribution, historical rows included, oldest
  /// first.
  fn list_submissions(
    &self,
    distribution_id: Uuid,
    platform: Option<Platform>,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// The submission's history ordered by `recorded_at`, then `sequence`.
  fn get_history(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ActionHistoryEntry>, Self::Error>> + Send + '_;

  // ── Transactional writes ──────────────────────────────────────────────

  /// Write `submission` if the stored row is still current at
  /// `expected_revision`, append `entry`, and recompute the distribution.
  fn commit_transition(
    &self,
    expected_revision: u64,
    submission: Submission,
    entry: NewHistoryEntry,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  /// Retire `predecessor_id` (checked at `expected_revision`), insert
  /// `submission` as the new current row, append `entry` for it, and
  /// recompute the distribution.
  fn commit_resubmission(
    &self,
    predecessor_id: Uuid,
    expected_revision: u64,
    submission: Submission,
    entry: NewHistoryEntry,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;
}
