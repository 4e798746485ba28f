//! The per-submission action history.
//!
//! Entries are append-only: the store assigns the timestamp and insertion
//! sequence, and nothing ever updates or deletes an entry afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

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
pub enum SubmissionAction {
  Submitted,
  Approved,
  Rejected,
  Cancelled,
  Released,
  Paused,
  Resumed,
  Halted,
  RolloutUpdated,
}

/// A recorded action. Ordered by `recorded_at`, then `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionHistoryEntry {
  pub entry_id:      Uuid,
  pub submission_id: Uuid,
  /// Store-assigned insertion order; breaks timestamp ties.
  pub sequence:      i64,
  pub action:        SubmissionAction,
  pub actor:         String,
  pub reason:        Option<String>,
  pub recorded_at:   DateTime<Utc>,
}

/// Input to the store's append; `recorded_at` and `sequence` are not
/// accepted from callers.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
  pub submission_id: Uuid,
  pub action:        SubmissionAction,
  pub actor:         String,
  pub reason:        Option<String>,
}
