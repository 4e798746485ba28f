//! Submissions: one platform-specific attempt to ship a release to its store.
//!
//! A distribution owns one *current* submission per platform. When a
//! submission is rejected or cancelled it is never reopened; a successor row
//! takes over the `is_current` flag and the old row becomes history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  platform::{Platform, StoreType},
};

// ─── Status ──────────────────────────────────────────────────────────────────

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
pub enum SubmissionStatus {
  Pending,
  InReview,
  Approved,
  Live,
  Paused,
  Halted,
  Rejected,
  Cancelled,
}

impl SubmissionStatus {
  /// Counts toward the distribution being released.
  pub fn is_released(self) -> bool {
    matches!(self, Self::Approved | Self::Live | Self::Paused | Self::Halted)
  }

  /// No further transitions; only a successor row can follow.
  pub fn is_terminal(self) -> bool { matches!(self, Self::Rejected | Self::Cancelled) }
}

// ─── Platform details ────────────────────────────────────────────────────────

/// Fields that only exist on one platform. The tag doubles as the
/// submission's platform, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformDetails {
  #[serde(rename_all = "camelCase")]
  Android {
    version_code:    Option<i64>,
    /// Play in-app update priority, 0 through 5.
    in_app_priority: Option<u8>,
  },
  #[serde(rename_all = "camelCase")]
  Ios {
    testflight_number: Option<String>,
    /// `None` until the first submit.
    phased_release:    Option<bool>,
    reset_rating:      Option<bool>,
  },
}

impl PlatformDetails {
  pub fn platform(&self) -> Platform {
    match self {
      Self::Android { .. } => Platform::Android,
      Self::Ios { .. } => Platform::Ios,
    }
  }

  /// Fresh details for a new row, carrying over the build identifier.
  fn blank(platform: Platform, version_code: Option<i64>, testflight_number: Option<String>) -> Self {
    match platform {
      Platform::Android => Self::Android { version_code, in_app_priority: None },
      Platform::Ios => Self::Ios {
        testflight_number,
        phased_release: None,
        reset_rating: None,
      },
    }
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
  pub submission_id:      Uuid,
  pub distribution_id:    Uuid,
  pub release_id:         Uuid,
  #[serde(flatten)]
  pub details:            PlatformDetails,
  pub store_type:         StoreType,
  pub status:             SubmissionStatus,
  /// Marketing version, e.g. `"4.2.0"`.
  pub version:            String,
  pub rollout_percentage: f64,
  pub release_notes:      Option<String>,
  pub artifact_path:      Option<String>,
  pub is_current:         bool,
  pub submitted_at:       Option<DateTime<Utc>>,
  pub submitted_by:       Option<String>,
  pub status_updated_at:  DateTime<Utc>,
  pub rejection_reason:   Option<String>,
  /// Optimistic-concurrency counter; bumped by the store on every write.
  pub revision:           u64,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

impl Submission {
  pub fn platform(&self) -> Platform { self.details.platform() }

  /// A new PENDING, current submission for one distribution target.
  pub fn pending(
    distribution_id: Uuid,
    release_id: Uuid,
    target: &SubmissionTarget,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      submission_id: Uuid::new_v4(),
      distribution_id,
      release_id,
      details: PlatformDetails::blank(
        target.platform,
        target.version_code,
        target.testflight_number.clone(),
      ),
      store_type: target.platform.store_type(),
      status: SubmissionStatus::Pending,
      version: target.version.clone(),
      rollout_percentage: 0.0,
      release_notes: None,
      artifact_path: None,
      is_current: true,
      submitted_at: None,
      submitted_by: None,
      status_updated_at: now,
      rejection_reason: None,
      revision: 1,
      created_at: now,
      updated_at: now,
    }
  }

  /// A PENDING successor to a rejected or cancelled submission. The build
  /// identifiers carry over; everything submit-specific starts empty.
  pub fn successor(&self, version: Option<String>, now: DateTime<Utc>) -> Self {
    let (version_code, testflight_number) = match &self.details {
      PlatformDetails::Android { version_code, .. } => (*version_code, None),
      PlatformDetails::Ios { testflight_number, .. } => (None, testflight_number.clone()),
    };
    let target = SubmissionTarget {
      platform: self.platform(),
      version: version.unwrap_or_else(|| self.version.clone()),
      version_code,
      testflight_number,
    };
    Self::pending(self.distribution_id, self.release_id, &target, now)
  }
}

/// One platform entry when creating a distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionTarget {
  pub platform:          Platform,
  pub version:           String,
  #[serde(default)]
  pub version_code:      Option<i64>,
  #[serde(default)]
  pub testflight_number: Option<String>,
}

// ─── Submit payloads ─────────────────────────────────────────────────────────

/// Android fields accepted by submit. Everything is optional at the type
/// level so that missing fields surface as field-scoped validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidSubmission {
  pub artifact_path:   Option<String>,
  pub release_notes:   Option<String>,
  pub rollout_percent: Option<f64>,
  pub in_app_priority: Option<u8>,
  pub version_code:    Option<i64>,
}

/// iOS fields accepted by submit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosSubmission {
  pub testflight_number: Option<String>,
  pub release_notes:     Option<String>,
  pub phased_release:    Option<bool>,
  pub reset_rating:      Option<bool>,
}

#[derive(Debug, Clone)]
pub enum SubmitPayload {
  Android(AndroidSubmission),
  Ios(IosSubmission),
}

impl SubmitPayload {
  pub fn platform(&self) -> Platform {
    match self {
      Self::Android(_) => Platform::Android,
      Self::Ios(_) => Platform::Ios,
    }
  }

  /// Decode the platform-specific body of a submit request.
  pub fn from_json(platform: Platform, body: serde_json::Value) -> Result<Self> {
    let invalid = |e: serde_json::Error| Error::validation("body", e.to_string());
    Ok(match platform {
      Platform::Android => Self::Android(serde_json::from_value(body).map_err(invalid)?),
      Platform::Ios => Self::Ios(serde_json::from_value(body).map_err(invalid)?),
    })
  }
}

/// Body of a resubmission: the submit payload plus an optional new version.
#[derive(Debug, Clone)]
pub struct ResubmitPayload {
  pub version: Option<String>,
  pub payload: SubmitPayload,
}

impl ResubmitPayload {
  /// Decode `{"platform": "...", "version": "...", ...submit fields}`.
  pub fn from_json(body: serde_json::Value) -> Result<Self> {
    let platform = body
      .get("platform")
      .and_then(|v| v.as_str())
      .ok_or_else(|| Error::validation("platform", "is required"))?
      .parse::<Platform>()
      .map_err(|_| Error::validation("platform", "must be ANDROID or IOS"))?;
    let version = match body.get("version") {
      None | Some(serde_json::Value::Null) => None,
      Some(serde_json::Value::String(v)) if !v.trim().is_empty() => Some(v.clone()),
      Some(_) => return Err(Error::validation("version", "must be a non-empty string")),
    };
    Ok(Self { version, payload: SubmitPayload::from_json(platform, body)? })
  }

  pub fn platform(&self) -> Platform { self.payload.platform() }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A submission with its audit trail and artifact metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetails {
  pub submission: Submission,
  pub history:    Vec<crate::history::ActionHistoryEntry>,
  pub artifact:   Option<crate::artifact::ArtifactMetadata>,
}
