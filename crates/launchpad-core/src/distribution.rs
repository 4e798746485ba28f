//! Distributions: a release's cross-platform rollout record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  platform::Platform,
  submission::{Submission, SubmissionTarget},
};

/// Aggregate rollout status across every target platform.
///
/// Variants are declared from least to most released; [`Self::rank`] exposes
/// that order.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionStatus {
  Pending,
  PartiallySubmitted,
  Submitted,
  PartiallyReleased,
  Released,
}

impl DistributionStatus {
  pub fn rank(self) -> u8 {
    match self {
      Self::Pending => 0,
      Self::PartiallySubmitted => 1,
      Self::Submitted => 2,
      Self::PartiallyReleased => 3,
      Self::Released => 4,
    }
  }
}

/// The cached `status` is a derived view; only
/// [`DistributionAggregator::recompute`](crate::aggregate::DistributionAggregator::recompute)
/// writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
  pub distribution_id: Uuid,
  pub release_id:      Uuid,
  pub tenant_id:       String,
  pub platforms:       BTreeSet<Platform>,
  pub status:          DistributionStatus,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// Input to distribution creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDistribution {
  pub release_id: Uuid,
  pub tenant_id:  String,
  pub targets:    Vec<SubmissionTarget>,
}

impl NewDistribution {
  /// Reject empty or duplicate target lists before anything is written.
  pub fn validate(&self) -> Result<()> {
    if self.tenant_id.trim().is_empty() {
      return Err(Error::validation("tenantId", "is required"));
    }
    if self.targets.is_empty() {
      return Err(Error::validation("targets", "at least one platform is required"));
    }
    let mut seen = BTreeSet::new();
    for target in &self.targets {
      if !seen.insert(target.platform) {
        return Err(Error::validation(
          "targets",
          format!("platform {} listed more than once", target.platform),
        ));
      }
      if target.version.trim().is_empty() {
        return Err(Error::validation("version", "is required"));
      }
    }
    Ok(())
  }

  /// Build the distribution and one PENDING submission per target. The
  /// status is left at PENDING for the caller's recompute to settle.
  pub fn build(&self, now: DateTime<Utc>) -> (Distribution, Vec<Submission>) {
    let distribution = Distribution {
      distribution_id: Uuid::new_v4(),
      release_id:      self.release_id,
      tenant_id:       self.tenant_id.clone(),
      platforms:       self.targets.iter().map(|t| t.platform).collect(),
      status:          DistributionStatus::Pending,
      created_at:      now,
      updated_at:      now,
    };
    let submissions = self
      .targets
      .iter()
      .map(|t| Submission::pending(distribution.distribution_id, self.release_id, t, now))
      .collect();
    (distribution, submissions)
  }
}

/// A distribution with its current submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionView {
  pub distribution: Distribution,
  pub submissions:  Vec<Submission>,
}
