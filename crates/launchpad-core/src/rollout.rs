//! Rollout controls: percentage updates, pause/halt, and resume.
//!
//! The controller checks a request against the submission's
//! [`PlatformRules`] and turns it into a [`Transition`]; the status flip
//! itself is left to the [`SubmissionStateMachine`](crate::transition::SubmissionStateMachine).

use crate::{
  Error, Result,
  platform::{Platform, PlatformRules},
  submission::{Submission, SubmissionStatus},
  transition::Transition,
};

pub struct RolloutController;

impl RolloutController {
  pub fn update_percentage(current: &Submission, rollout_percentage: f64) -> Result<Transition> {
    PlatformRules::for_submission(current).validate_rollout_update(
      current.status,
      current.rollout_percentage,
      rollout_percentage,
    )?;
    Ok(Transition::UpdateRollout { rollout_percentage })
  }

  /// Stop a LIVE rollout the way the platform does it: iOS phased releases
  /// pause, Android staged rollouts halt.
  pub fn pause(current: &Submission, reason: &str) -> Result<Transition> {
    let rules = PlatformRules::for_submission(current);
    let target = rules.validate_pause(current.status, current.rollout_percentage)?;
    let reason = reason.to_owned();
    Ok(match target {
      SubmissionStatus::Halted => Transition::Halt { reason },
      _ => Transition::Pause { reason },
    })
  }

  /// Explicit Android halt.
  pub fn halt(current: &Submission, reason: &str) -> Result<Transition> {
    if current.platform() != Platform::Android {
      return Err(Error::invalid_transition(
        "only Android rollouts can be halted; pause an iOS phased release instead",
      ));
    }
    Self::pause(current, reason)
  }

  pub fn resume(current: &Submission) -> Result<Transition> {
    let from = PlatformRules::for_submission(current).resumable_from();
    if current.status != from {
      return Err(Error::invalid_transition(format!(
        "{} rollouts resume from {from} (currently {})",
        current.platform(),
        current.status
      )));
    }
    Ok(Transition::Resume)
  }
}
