//! Derives a distribution's status from its current submissions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::{
  distribution::{Distribution, DistributionStatus},
  platform::Platform,
  submission::{Submission, SubmissionStatus},
};

pub struct DistributionAggregator;

impl DistributionAggregator {
  /// Pure status computation. A target platform with no current submission
  /// counts as PENDING.
  pub fn compute_status(
    platforms: &BTreeSet<Platform>,
    current: &BTreeMap<Platform, SubmissionStatus>,
  ) -> DistributionStatus {
    let statuses: Vec<SubmissionStatus> = platforms
      .iter()
      .map(|p| current.get(p).copied().unwrap_or(SubmissionStatus::Pending))
      .collect();

    if let [only] = statuses.as_slice() {
      return if *only == SubmissionStatus::Pending {
        DistributionStatus::Pending
      } else if only.is_released() {
        DistributionStatus::Released
      } else {
        DistributionStatus::Submitted
      };
    }

    let total = statuses.len();
    let pending = statuses.iter().filter(|s| **s == SubmissionStatus::Pending).count();
    let released = statuses.iter().filter(|s| s.is_released()).count();
    let in_review = statuses.iter().filter(|s| **s == SubmissionStatus::InReview).count();

    if pending == total {
      DistributionStatus::Pending
    } else if released == total {
      DistributionStatus::Released
    } else if released > 0 {
      DistributionStatus::PartiallyReleased
    } else if in_review == total {
      DistributionStatus::Submitted
    } else if in_review > 0 && pending > 0 && in_review + pending == total {
      DistributionStatus::PartiallySubmitted
    } else {
      DistributionStatus::Pending
    }
  }

  /// The single entry point that writes a distribution's cached status.
  /// Returns `true` if the status changed.
  pub fn recompute(
    distribution: &mut Distribution,
    current: &[Submission],
    now: DateTime<Utc>,
  ) -> bool {
    let by_platform: BTreeMap<Platform, SubmissionStatus> = current
      .iter()
      .filter(|s| s.is_current && s.distribution_id == distribution.distribution_id)
      .map(|s| (s.platform(), s.status))
      .collect();

    let status = Self::compute_status(&distribution.platforms, &by_platform);
    if status == distribution.status {
      return false;
    }
    tracing::debug!(
      distribution_id = %distribution.distribution_id,
      from = %distribution.status,
      to = %status,
      "distribution status recomputed"
    );
    distribution.status = status;
    distribution.updated_at = now;
    true
  }
}
