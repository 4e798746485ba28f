//! Plain-text rendering of API responses.

use std::fmt::Write as _;

use launchpad_core::{
  distribution::{Distribution, DistributionView},
  submission::{PlatformDetails, Submission, SubmissionDetails},
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn distributions(rows: &[Distribution]) -> String {
  if rows.is_empty() {
    return "no distributions\n".to_string();
  }
  let mut out = String::new();
  for d in rows {
    let platforms: Vec<String> = d.platforms.iter().map(ToString::to_string).collect();
    let _ = writeln!(
      out,
      "{}  {:<19}  {:<12}  {:<12}  {}",
      d.distribution_id,
      d.status,
      d.tenant_id,
      platforms.join(","),
      d.updated_at.format(TIME_FORMAT),
    );
  }
  out
}

pub fn distribution(view: &DistributionView) -> String {
  let d = &view.distribution;
  let mut out = String::new();
  let _ = writeln!(out, "distribution {}", d.distribution_id);
  let _ = writeln!(out, "  release  {}", d.release_id);
  let _ = writeln!(out, "  tenant   {}", d.tenant_id);
  let _ = writeln!(out, "  status   {}", d.status);
  for s in &view.submissions {
    let _ = writeln!(out, "  {}", submission(s));
  }
  out
}

/// One-line summary of a submission.
pub fn submission(s: &Submission) -> String {
  let build = match &s.details {
    PlatformDetails::Android { version_code, .. } => {
      version_code.map(|c| format!(" ({c})")).unwrap_or_default()
    }
    PlatformDetails::Ios { testflight_number, .. } => {
      testflight_number.as_ref().map(|n| format!(" (build {n})")).unwrap_or_default()
    }
  };
  format!(
    "{:<7}  {}  {:<9}  {}{build}  rollout {}%",
    s.platform(),
    s.submission_id,
    s.status,
    s.version,
    s.rollout_percentage,
  )
}

pub fn submission_details(details: &SubmissionDetails) -> String {
  let s = &details.submission;
  let mut out = submission(s);
  out.push('\n');
  if let Some(reason) = &s.rejection_reason {
    let _ = writeln!(out, "  rejected: {reason}");
  }
  if let Some(artifact) = &details.artifact {
    let _ = writeln!(
      out,
      "  artifact {} ({} bytes, sha256 {})",
      artifact.path, artifact.size_bytes, artifact.content_hash
    );
  }
  for entry in &details.history {
    let _ = write!(
      out,
      "  {}  {:<17}  {}",
      entry.recorded_at.format(TIME_FORMAT),
      entry.action,
      entry.actor
    );
    if let Some(reason) = &entry.reason {
      let _ = write!(out, "  \"{reason}\"");
    }
    out.push('\n');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use launchpad_core::{
    history::{ActionHistoryEntry, SubmissionAction},
    platform::Platform,
    submission::{SubmissionStatus, SubmissionTarget},
  };
  use uuid::Uuid;

  fn android() -> Submission {
    let mut s = Submission::pending(
      Uuid::nil(),
      Uuid::nil(),
      &SubmissionTarget {
        platform:          Platform::Android,
        version:           "2.4.0".into(),
        version_code:      Some(240),
        testflight_number: None,
      },
      Utc::now(),
    );
    s.status = SubmissionStatus::Live;
    s.rollout_percentage = 25.0;
    s
  }

  #[test]
  fn submission_line_shows_build_and_rollout() {
    let line = submission(&android());
    assert!(line.starts_with("ANDROID"), "{line}");
    assert!(line.contains("LIVE"), "{line}");
    assert!(line.contains("2.4.0 (240)"), "{line}");
    assert!(line.ends_with("rollout 25%"), "{line}");
  }

  #[test]
  fn details_list_history_with_reasons() {
    let s = android();
    let details = SubmissionDetails {
      history:    vec![ActionHistoryEntry {
        entry_id:      Uuid::new_v4(),
        submission_id: s.submission_id,
        sequence:      1,
        action:        SubmissionAction::Paused,
        actor:         "alice".into(),
        reason:        Some("crash spike".into()),
        recorded_at:   Utc::now(),
      }],
      artifact:   None,
      submission: s,
    };
    let text = submission_details(&details);
    assert!(text.contains("PAUSED"), "{text}");
    assert!(text.contains("alice"), "{text}");
    assert!(text.contains("\"crash spike\""), "{text}");
  }

  #[test]
  fn empty_distribution_list() {
    assert_eq!(distributions(&[]), "no distributions\n");
  }
}
