//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so they sort lexically. Enums use their SCREAMING_SNAKE_CASE
//! names. UUIDs are stored as hyphenated lowercase strings.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use launchpad_core::{
  distribution::Distribution,
  history::ActionHistoryEntry,
  platform::Platform,
  submission::{PlatformDetails, Submission},
};
use uuid::Uuid;

use crate::{Error, Result};

/// Wrap a decode failure so it can leave a `Connection::call` closure.
pub fn call_err(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(column: &'static str, s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::decode(column, e))
}

fn decode_opt_dt(column: &'static str, s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(|s| decode_dt(column, s)).transpose()
}

pub fn decode_enum<T>(column: &'static str, s: &str) -> Result<T>
where
  T: FromStr,
  T::Err: Display,
{
  s.parse().map_err(|e| Error::decode(column, format!("{s:?}: {e}")))
}

pub fn encode_platforms(platforms: &BTreeSet<Platform>) -> Result<String> {
  Ok(serde_json::to_string(platforms)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const DISTRIBUTION_COLUMNS: &str =
  "distribution_id, release_id, tenant_id, platforms, status, created_at, updated_at";

/// Raw strings read directly from a `distributions` row.
pub struct RawDistribution {
  pub distribution_id: String,
  pub release_id:      String,
  pub tenant_id:       String,
  pub platforms:       String,
  pub status:          String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawDistribution {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      distribution_id: row.get(0)?,
      release_id:      row.get(1)?,
      tenant_id:       row.get(2)?,
      platforms:       row.get(3)?,
      status:          row.get(4)?,
      created_at:      row.get(5)?,
      updated_at:      row.get(6)?,
    })
  }

  pub fn into_distribution(self) -> Result<Distribution> {
    Ok(Distribution {
      distribution_id: decode_uuid(&self.distribution_id)?,
      release_id:      decode_uuid(&self.release_id)?,
      tenant_id:       self.tenant_id,
      platforms:       serde_json::from_str(&self.platforms)?,
      status:          decode_enum("status", &self.status)?,
      created_at:      decode_dt("created_at", &self.created_at)?,
      updated_at:      decode_dt("updated_at", &self.updated_at)?,
    })
  }
}

pub const SUBMISSION_COLUMNS: &str = "submission_id, distribution_id, release_id, platform, \
   store_type, status, version, version_code, in_app_priority, testflight_number, \
   phased_release, reset_rating, rollout_percentage, release_notes, artifact_path, \
   is_current, submitted_at, submitted_by, status_updated_at, rejection_reason, revision, \
   created_at, updated_at";

/// Raw values read directly from a `submissions` row.
pub struct RawSubmission {
  pub submission_id:      String,
  pub distribution_id:    String,
  pub release_id:         String,
  pub platform:           String,
  pub store_type:         String,
  pub status:             String,
  pub version:            String,
  pub version_code:       Option<i64>,
  pub in_app_priority:    Option<i64>,
  pub testflight_number:  Option<String>,
  pub phased_release:     Option<bool>,
  pub reset_rating:       Option<bool>,
  pub rollout_percentage: f64,
  pub release_notes:      Option<String>,
  pub artifact_path:      Option<String>,
  pub is_current:         bool,
  pub submitted_at:       Option<String>,
  pub submitted_by:       Option<String>,
  pub status_updated_at:  String,
  pub rejection_reason:   Option<String>,
  pub revision:           i64,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawSubmission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id:      row.get(0)?,
      distribution_id:    row.get(1)?,
      release_id:         row.get(2)?,
      platform:           row.get(3)?,
      store_type:         row.get(4)?,
      status:             row.get(5)?,
      version:            row.get(6)?,
      version_code:       row.get(7)?,
      in_app_priority:    row.get(8)?,
      testflight_number:  row.get(9)?,
      phased_release:     row.get(10)?,
      reset_rating:       row.get(11)?,
      rollout_percentage: row.get(12)?,
      release_notes:      row.get(13)?,
      artifact_path:      row.get(14)?,
      is_current:         row.get(15)?,
      submitted_at:       row.get(16)?,
      submitted_by:       row.get(17)?,
      status_updated_at:  row.get(18)?,
      rejection_reason:   row.get(19)?,
      revision:           row.get(20)?,
      created_at:         row.get(21)?,
      updated_at:         row.get(22)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    let platform: Platform = decode_enum("platform", &self.platform)?;
    let details = match platform {
      Platform::Android => PlatformDetails::Android {
        version_code:    self.version_code,
        in_app_priority: self
          .in_app_priority
          .map(u8::try_from)
          .transpose()
          .map_err(|e| Error::decode("in_app_priority", e))?,
      },
      Platform::Ios => PlatformDetails::Ios {
        testflight_number: self.testflight_number,
        phased_release:    self.phased_release,
        reset_rating:      self.reset_rating,
      },
    };

    Ok(Submission {
      submission_id: decode_uuid(&self.submission_id)?,
      distribution_id: decode_uuid(&self.distribution_id)?,
      release_id: decode_uuid(&self.release_id)?,
      details,
      store_type: decode_enum("store_type", &self.store_type)?,
      status: decode_enum("status", &self.status)?,
      version: self.version,
      rollout_percentage: self.rollout_percentage,
      release_notes: self.release_notes,
      artifact_path: self.artifact_path,
      is_current: self.is_current,
      submitted_at: decode_opt_dt("submitted_at", self.submitted_at)?,
      submitted_by: self.submitted_by,
      status_updated_at: decode_dt("status_updated_at", &self.status_updated_at)?,
      rejection_reason: self.rejection_reason,
      revision: u64::try_from(self.revision).map_err(|e| Error::decode("revision", e))?,
      created_at: decode_dt("created_at", &self.created_at)?,
      updated_at: decode_dt("updated_at", &self.updated_at)?,
    })
  }
}

/// Column values for writing a submission row, in [`SUBMISSION_COLUMNS`]
/// order.
pub struct SubmissionRow {
  pub submission_id:      String,
  pub distribution_id:    String,
  pub release_id:         String,
  pub platform:           String,
  pub store_type:         String,
  pub status:             String,
  pub version:            String,
  pub version_code:       Option<i64>,
  pub in_app_priority:    Option<i64>,
  pub testflight_number:  Option<String>,
  pub phased_release:     Option<bool>,
  pub reset_rating:       Option<bool>,
  pub rollout_percentage: f64,
  pub release_notes:      Option<String>,
  pub artifact_path:      Option<String>,
  pub is_current:         bool,
  pub submitted_at:       Option<String>,
  pub submitted_by:       Option<String>,
  pub status_updated_at:  String,
  pub rejection_reason:   Option<String>,
  pub revision:           i64,
  pub created_at:         String,
  pub updated_at:         String,
}

impl SubmissionRow {
  pub fn encode(s: &Submission) -> Result<Self> {
    let (version_code, in_app_priority, testflight_number, phased_release, reset_rating) =
      match &s.details {
        PlatformDetails::Android { version_code, in_app_priority } => {
          (*version_code, in_app_priority.map(i64::from), None, None, None)
        }
        PlatformDetails::Ios { testflight_number, phased_release, reset_rating } => {
          (None, None, testflight_number.clone(), *phased_release, *reset_rating)
        }
      };

    Ok(Self {
      submission_id: encode_uuid(s.submission_id),
      distribution_id: encode_uuid(s.distribution_id),
      release_id: encode_uuid(s.release_id),
      platform: s.platform().to_string(),
      store_type: s.store_type.to_string(),
      status: s.status.to_string(),
      version: s.version.clone(),
      version_code,
      in_app_priority,
      testflight_number,
      phased_release,
      reset_rating,
      rollout_percentage: s.rollout_percentage,
      release_notes: s.release_notes.clone(),
      artifact_path: s.artifact_path.clone(),
      is_current: s.is_current,
      submitted_at: s.submitted_at.map(encode_dt),
      submitted_by: s.submitted_by.clone(),
      status_updated_at: encode_dt(s.status_updated_at),
      rejection_reason: s.rejection_reason.clone(),
      revision: i64::try_from(s.revision).map_err(|e| Error::decode("revision", e))?,
      created_at: encode_dt(s.created_at),
      updated_at: encode_dt(s.updated_at),
    })
  }
}

pub const HISTORY_COLUMNS: &str =
  "entry_id, submission_id, sequence, action, actor, reason, recorded_at";

/// Raw values read directly from an `action_history` row.
pub struct RawHistoryEntry {
  pub entry_id:      String,
  pub submission_id: String,
  pub sequence:      i64,
  pub action:        String,
  pub actor:         String,
  pub reason:        Option<String>,
  pub recorded_at:   String,
}

impl RawHistoryEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:      row.get(0)?,
      submission_id: row.get(1)?,
      sequence:      row.get(2)?,
      action:        row.get(3)?,
      actor:         row.get(4)?,
      reason:        row.get(5)?,
      recorded_at:   row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<ActionHistoryEntry> {
    Ok(ActionHistoryEntry {
      entry_id:      decode_uuid(&self.entry_id)?,
      submission_id: decode_uuid(&self.submission_id)?,
      sequence:      self.sequence,
      action:        decode_enum("action", &self.action)?,
      actor:         self.actor,
      reason:        self.reason,
      recorded_at:   decode_dt("recorded_at", &self.recorded_at)?,
    })
  }
}
