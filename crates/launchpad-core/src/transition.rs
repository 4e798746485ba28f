//! The submission state machine.
//!
//! [`SubmissionStateMachine::apply`] is pure: given the current row and a
//! requested [`Transition`], it returns the next row plus the history entry
//! to append, or the reason the transition is not allowed. Persisting the
//! result (conditionally on the row's revision) is the store's job.
//!
//! ```text
//! PENDING ──submit──▶ IN_REVIEW ──approve──▶ APPROVED ──release──▶ LIVE
//!                        │  │                                    │  ▲
//!                 reject │  │ cancel (iOS)        pause (iOS) /  │  │ resume
//!                        ▼  ▼                     halt (Android) ▼  │
//!                  REJECTED  CANCELLED                    PAUSED / HALTED
//! ```

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  history::{NewHistoryEntry, SubmissionAction},
  platform::{PlatformRules, validate_percentage},
  submission::{
    AndroidSubmission, IosSubmission, PlatformDetails, Submission, SubmissionStatus,
    SubmitPayload,
  },
};

/// Highest Play in-app update priority.
const MAX_IN_APP_PRIORITY: u8 = 5;

// ─── Transition ──────────────────────────────────────────────────────────────

/// A requested change to a submission.
#[derive(Debug, Clone)]
pub enum Transition {
  Submit(SubmitPayload),
  /// Store approval signal.
  Approve,
  Reject { reason: String },
  Cancel { reason: String },
  Release { rollout_percentage: Option<f64> },
  /// iOS phased release pause.
  Pause { reason: String },
  /// Android staged rollout halt.
  Halt { reason: String },
  Resume,
  /// Manual rollout change through the rollout controls.
  UpdateRollout { rollout_percentage: f64 },
  /// Store-reported rollout progress (e.g. Apple advancing a phased release).
  SyncRollout { rollout_percentage: f64 },
}

impl Transition {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Submit(_) => "submit",
      Self::Approve => "approve",
      Self::Reject { .. } => "reject",
      Self::Cancel { .. } => "cancel",
      Self::Release { .. } => "release",
      Self::Pause { .. } => "pause",
      Self::Halt { .. } => "halt",
      Self::Resume => "resume",
      Self::UpdateRollout { .. } | Self::SyncRollout { .. } => "update rollout of",
    }
  }
}

/// The outcome of a valid transition, ready to be committed.
#[derive(Debug, Clone)]
pub struct AppliedTransition {
  pub submission: Submission,
  pub entry:      NewHistoryEntry,
}

// ─── State machine ───────────────────────────────────────────────────────────

pub struct SubmissionStateMachine;

impl SubmissionStateMachine {
  pub fn apply(
    current: &Submission,
    transition: Transition,
    actor: &str,
    now: DateTime<Utc>,
  ) -> Result<AppliedTransition> {
    let actor = require_actor(actor)?;
    if !current.is_current {
      return Err(Error::invalid_transition(format!(
        "submission {} has been superseded",
        current.submission_id
      )));
    }

    let rules = PlatformRules::for_submission(current);
    let mut next = current.clone();
    let name = transition.name();

    let (action, reason) = match transition {
      Transition::Submit(payload) => {
        expect_status(current, name, SubmissionStatus::Pending)?;
        apply_submit(&mut next, payload, &actor, now)?;
        next.status = SubmissionStatus::InReview;
        (SubmissionAction::Submitted, None)
      }
      Transition::Approve => {
        expect_status(current, name, SubmissionStatus::InReview)?;
        next.status = SubmissionStatus::Approved;
        (SubmissionAction::Approved, None)
      }
      Transition::Reject { reason } => {
        expect_status(current, name, SubmissionStatus::InReview)?;
        let reason = require_reason("rejectionReason", reason)?;
        next.status = SubmissionStatus::Rejected;
        next.rejection_reason = Some(reason.clone());
        (SubmissionAction::Rejected, Some(reason))
      }
      Transition::Cancel { reason } => {
        expect_status(current, name, SubmissionStatus::InReview)?;
        rules.validate_cancel()?;
        let reason = require_reason("reason", reason)?;
        next.status = SubmissionStatus::Cancelled;
        (SubmissionAction::Cancelled, Some(reason))
      }
      Transition::Release { rollout_percentage } => {
        expect_status(current, name, SubmissionStatus::Approved)?;
        next.rollout_percentage =
          rules.initial_rollout_on_live(rollout_percentage, current.rollout_percentage)?;
        next.status = SubmissionStatus::Live;
        (SubmissionAction::Released, None)
      }
      Transition::Pause { reason } => {
        stop_rollout(current, &rules, SubmissionStatus::Paused)?;
        let reason = require_reason("reason", reason)?;
        next.status = SubmissionStatus::Paused;
        (SubmissionAction::Paused, Some(reason))
      }
      Transition::Halt { reason } => {
        stop_rollout(current, &rules, SubmissionStatus::Halted)?;
        let reason = require_reason("reason", reason)?;
        next.status = SubmissionStatus::Halted;
        (SubmissionAction::Halted, Some(reason))
      }
      Transition::Resume => {
        expect_status(current, name, rules.resumable_from())?;
        next.status = SubmissionStatus::Live;
        (SubmissionAction::Resumed, None)
      }
      Transition::UpdateRollout { rollout_percentage } => {
        rules.validate_rollout_update(
          current.status,
          current.rollout_percentage,
          rollout_percentage,
        )?;
        next.rollout_percentage = rollout_percentage;
        (SubmissionAction::RolloutUpdated, None)
      }
      Transition::SyncRollout { rollout_percentage } => {
        expect_status(current, name, SubmissionStatus::Live)?;
        rules.validate_store_sync(current.rollout_percentage, rollout_percentage)?;
        next.rollout_percentage = rollout_percentage;
        (SubmissionAction::RolloutUpdated, None)
      }
    };

    if next.status != current.status {
      next.status_updated_at = now;
    }
    next.updated_at = now;

    Ok(AppliedTransition {
      entry: NewHistoryEntry {
        submission_id: current.submission_id,
        action,
        actor,
        reason,
      },
      submission: next,
    })
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

pub(crate) fn require_actor(actor: &str) -> Result<String> {
  let actor = actor.trim();
  if actor.is_empty() {
    return Err(Error::Authorization("an actor is required".into()));
  }
  Ok(actor.to_owned())
}

fn require_reason(field: &str, reason: String) -> Result<String> {
  let trimmed = reason.trim();
  if trimmed.is_empty() {
    return Err(Error::validation(field, "is required"));
  }
  Ok(trimmed.to_owned())
}

fn require_text(field: &str, value: Option<String>) -> Result<String> {
  match value {
    Some(v) if !v.trim().is_empty() => Ok(v),
    _ => Err(Error::validation(field, "is required")),
  }
}

fn expect_status(
  current: &Submission,
  action: &str,
  expected: SubmissionStatus,
) -> Result<()> {
  if current.status != expected {
    return Err(Error::invalid_transition(format!(
      "cannot {action} a {} submission in status {} (requires {expected})",
      current.platform(),
      current.status
    )));
  }
  Ok(())
}

/// Pause and halt share one rule lookup; the requested stop must be the one
/// this platform uses.
fn stop_rollout(
  current: &Submission,
  rules: &PlatformRules,
  requested: SubmissionStatus,
) -> Result<()> {
  let target = rules.validate_pause(current.status, current.rollout_percentage)?;
  if target != requested {
    return Err(Error::invalid_transition(format!(
      "{} rollouts move to {target}, not {requested}",
      rules.platform()
    )));
  }
  Ok(())
}

fn apply_submit(
  next: &mut Submission,
  payload: SubmitPayload,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<()> {
  if payload.platform() != next.platform() {
    return Err(Error::validation(
      "platform",
      format!(
        "{} payload sent for a {} submission",
        payload.platform(),
        next.platform()
      ),
    ));
  }

  match (payload, &mut next.details) {
    (
      SubmitPayload::Android(AndroidSubmission {
        artifact_path,
        release_notes,
        rollout_percent,
        in_app_priority,
        version_code: new_version_code,
      }),
      PlatformDetails::Android { version_code, in_app_priority: priority },
    ) => {
      let artifact = require_text("artifactPath", artifact_path)?;
      let notes = require_text("releaseNotes", release_notes)?;
      let rollout = rollout_percent
        .ok_or_else(|| Error::validation("rolloutPercent", "is required"))
        .and_then(|p| validate_percentage("rolloutPercent", p))?;
      let in_app = in_app_priority.unwrap_or(0);
      if in_app > MAX_IN_APP_PRIORITY {
        return Err(Error::validation("inAppPriority", "must be between 0 and 5"));
      }
      if let Some(code) = new_version_code {
        if code <= 0 {
          return Err(Error::validation("versionCode", "must be positive"));
        }
        *version_code = Some(code);
      }
      *priority = Some(in_app);
      next.artifact_path = Some(artifact);
      next.release_notes = Some(notes);
      next.rollout_percentage = rollout;
    }
    (
      SubmitPayload::Ios(IosSubmission {
        testflight_number: build,
        release_notes,
        phased_release: phased,
        reset_rating: reset,
      }),
      PlatformDetails::Ios { testflight_number, phased_release, reset_rating },
    ) => {
      let build = require_text("testflightNumber", build)?;
      let notes = require_text("releaseNotes", release_notes)?;
      let phased = phased.ok_or_else(|| Error::validation("phasedRelease", "is required"))?;
      let reset = reset.ok_or_else(|| Error::validation("resetRating", "is required"))?;
      *testflight_number = Some(build);
      *phased_release = Some(phased);
      *reset_rating = Some(reset);
      next.release_notes = Some(notes);
    }
    // Platforms were compared above.
    _ => return Err(Error::validation("platform", "payload does not match submission")),
  }

  next.submitted_at = Some(now);
  next.submitted_by = Some(actor.to_owned());
  next.rejection_reason = None;
  Ok(())
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::{
    platform::Platform,
    submission::{SubmissionTarget, SubmissionStatus::*},
  };

  fn pending(platform: Platform) -> Submission {
    let target = SubmissionTarget {
      platform,
      version: "3.1.0".into(),
      version_code: Some(310),
      testflight_number: Some("88".into()),
    };
    Submission::pending(Uuid::new_v4(), Uuid::new_v4(), &target, Utc::now())
  }

  fn android_payload() -> SubmitPayload {
    SubmitPayload::Android(AndroidSubmission {
      artifact_path:   Some("acme/app-release.aab".into()),
      release_notes:   Some("Bug fixes".into()),
      rollout_percent: Some(10.0),
      in_app_priority: Some(2),
      version_code:    None,
    })
  }

  fn ios_payload(phased: bool) -> SubmitPayload {
    SubmitPayload::Ios(IosSubmission {
      testflight_number: Some("88".into()),
      release_notes:     Some("Bug fixes".into()),
      phased_release:    Some(phased),
      reset_rating:      Some(false),
    })
  }

  fn step(sub: &Submission, t: Transition) -> Result<Submission> {
    SubmissionStateMachine::apply(sub, t, "alice", Utc::now()).map(|a| a.submission)
  }

  fn live(platform: Platform, phased: bool) -> Submission {
    let payload = match platform {
      Platform::Android => android_payload(),
      Platform::Ios => ios_payload(phased),
    };
    let sub = step(&pending(platform), Transition::Submit(payload)).unwrap();
    let sub = step(&sub, Transition::Approve).unwrap();
    step(&sub, Transition::Release { rollout_percentage: None }).unwrap()
  }

  #[test]
  fn submit_moves_pending_to_in_review_and_records_submitter() {
    let applied = SubmissionStateMachine::apply(
      &pending(Platform::Android),
      Transition::Submit(android_payload()),
      "alice",
      Utc::now(),
    )
    .unwrap();
    let sub = applied.submission;
    assert_eq!(sub.status, InReview);
    assert_eq!(sub.submitted_by.as_deref(), Some("alice"));
    assert_eq!(sub.rollout_percentage, 10.0);
    assert_eq!(sub.artifact_path.as_deref(), Some("acme/app-release.aab"));
    assert_eq!(applied.entry.action, SubmissionAction::Submitted);
    assert_eq!(applied.entry.actor, "alice");
  }

  #[test]
  fn submit_twice_is_an_invalid_transition() {
    let sub = step(&pending(Platform::Android), Transition::Submit(android_payload())).unwrap();
    let err = step(&sub, Transition::Submit(android_payload())).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)), "{err}");
  }

  #[test]
  fn submit_validates_platform_fields() {
    let missing_notes = SubmitPayload::Android(AndroidSubmission {
      release_notes: None,
      ..match android_payload() {
        SubmitPayload::Android(a) => a,
        SubmitPayload::Ios(_) => unreachable!(),
      }
    });
    let err = step(&pending(Platform::Android), Transition::Submit(missing_notes)).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "releaseNotes"));

    let no_phased = SubmitPayload::Ios(IosSubmission {
      testflight_number: Some("1".into()),
      release_notes:     Some("n".into()),
      phased_release:    None,
      reset_rating:      Some(true),
    });
    let err = step(&pending(Platform::Ios), Transition::Submit(no_phased)).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "phasedRelease"));
  }

  #[test]
  fn submit_rejects_wrong_platform_payload() {
    let err = step(&pending(Platform::Ios), Transition::Submit(android_payload())).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "platform"));
  }

  #[test]
  fn submit_rejects_bad_in_app_priority() {
    let payload = SubmitPayload::Android(AndroidSubmission {
      artifact_path:   Some("a.aab".into()),
      release_notes:   Some("n".into()),
      rollout_percent: Some(1.0),
      in_app_priority: Some(9),
      version_code:    None,
    });
    let err = step(&pending(Platform::Android), Transition::Submit(payload)).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "inAppPriority"));
  }

  #[test]
  fn reject_requires_reason_and_is_terminal() {
    let sub = step(&pending(Platform::Ios), Transition::Submit(ios_payload(true))).unwrap();
    let err = step(&sub, Transition::Reject { reason: "  ".into() }).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "rejectionReason"));

    let rejected = step(&sub, Transition::Reject { reason: "Guideline 2.1".into() }).unwrap();
    assert_eq!(rejected.status, Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Guideline 2.1"));
    for t in [Transition::Approve, Transition::Resume, Transition::Cancel { reason: "x".into() }] {
      assert!(matches!(step(&rejected, t), Err(Error::InvalidTransition(_))));
    }
  }

  #[test]
  fn cancel_is_ios_only() {
    let ios = step(&pending(Platform::Ios), Transition::Submit(ios_payload(false))).unwrap();
    assert_eq!(step(&ios, Transition::Cancel { reason: "wrong build".into() }).unwrap().status, Cancelled);

    let android = step(&pending(Platform::Android), Transition::Submit(android_payload())).unwrap();
    let err = step(&android, Transition::Cancel { reason: "wrong build".into() }).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
  }

  #[test]
  fn release_initialises_rollout_per_platform() {
    assert_eq!(live(Platform::Ios, false).rollout_percentage, 100.0);
    assert_eq!(live(Platform::Ios, true).rollout_percentage, 1.0);
    assert_eq!(live(Platform::Android, false).rollout_percentage, 10.0);
  }

  #[test]
  fn release_requires_approval() {
    let sub = step(&pending(Platform::Android), Transition::Submit(android_payload())).unwrap();
    let err = step(&sub, Transition::Release { rollout_percentage: Some(5.0) }).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
  }

  #[test]
  fn pausing_manual_ios_release_is_invalid() {
    let err = step(&live(Platform::Ios, false), Transition::Pause { reason: "crash".into() }).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)), "{err}");
  }

  #[test]
  fn pause_and_halt_do_not_cross_platforms() {
    let err = step(&live(Platform::Android, false), Transition::Pause { reason: "crash".into() }).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
    let err = step(&live(Platform::Ios, true), Transition::Halt { reason: "crash".into() }).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
  }

  #[test]
  fn pause_requires_reason_after_status_check() {
    let err = step(&live(Platform::Ios, true), Transition::Pause { reason: String::new() }).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "reason"));
  }

  #[test]
  fn halt_then_resume_keeps_percentage() {
    let sub = live(Platform::Android, false);
    let halted = step(&sub, Transition::Halt { reason: "ANR spike".into() }).unwrap();
    assert_eq!(halted.status, Halted);
    let resumed = step(&halted, Transition::Resume).unwrap();
    assert_eq!(resumed.status, Live);
    assert_eq!(resumed.rollout_percentage, sub.rollout_percentage);
  }

  #[test]
  fn resume_requires_the_platform_stop_status() {
    let err = step(&live(Platform::Ios, true), Transition::Resume).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
  }

  #[test]
  fn superseded_rows_are_frozen() {
    let mut sub = pending(Platform::Android);
    sub.is_current = false;
    let err = step(&sub, Transition::Submit(android_payload())).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
  }

  #[test]
  fn blank_actor_is_unauthorized() {
    let err = SubmissionStateMachine::apply(
      &pending(Platform::Android),
      Transition::Submit(android_payload()),
      " ",
      Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
  }

  #[test]
  fn rollout_update_keeps_status_timestamp() {
    let sub = live(Platform::Android, false);
    let updated = step(&sub, Transition::UpdateRollout { rollout_percentage: 50.0 }).unwrap();
    assert_eq!(updated.rollout_percentage, 50.0);
    assert_eq!(updated.status, Live);
    assert_eq!(updated.status_updated_at, sub.status_updated_at);
  }

  #[test]
  fn store_sync_moves_phased_release_through_steps() {
    let sub = live(Platform::Ios, true);
    let synced = step(&sub, Transition::SyncRollout { rollout_percentage: 5.0 }).unwrap();
    assert_eq!(synced.rollout_percentage, 5.0);
    let err = step(&synced, Transition::UpdateRollout { rollout_percentage: 50.0 }).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
  }
}
