//! External store-status signals.
//!
//! An external poller reports what App Store Connect or the Play Console
//! currently shows for a submission. Each signal is mapped to the next
//! transition that moves the row towards that state; the service applies
//! transitions until the signal maps to nothing, which makes repeated
//! reports of the same state no-ops.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  platform::{FULL_ROLLOUT_PERCENT, PlatformRules},
  submission::{Submission, SubmissionStatus},
  transition::Transition,
};

/// Reason recorded when the store itself stops a rollout.
pub const STORE_PAUSE_REASON: &str = "paused in the store console";
pub const STORE_HALT_REASON: &str = "halted in the store console";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "storeStatus", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatusSignal {
  InReview,
  Approved,
  #[serde(rename_all = "camelCase")]
  Rejected { reason: String },
  #[serde(rename_all = "camelCase")]
  Live {
    #[serde(default)]
    rollout_percentage: Option<f64>,
  },
  Paused,
  Halted,
  #[serde(rename_all = "camelCase")]
  Cancelled { reason: String },
}

impl StoreStatusSignal {
  /// The next transition towards this signal's state, or `None` once the
  /// submission already reflects it.
  pub fn next_transition(&self, current: &Submission) -> Result<Option<Transition>> {
    use SubmissionStatus as S;

    let next = match (self, current.status) {
      (Self::InReview, S::InReview)
      | (Self::Approved, S::Approved)
      | (Self::Rejected { .. }, S::Rejected)
      | (Self::Cancelled { .. }, S::Cancelled)
      | (Self::Paused, S::Paused)
      | (Self::Halted, S::Halted) => None,

      (Self::Approved, S::InReview) | (Self::Live { .. }, S::InReview) => {
        Some(Transition::Approve)
      }
      (Self::Rejected { reason }, S::InReview) => {
        Some(Transition::Reject { reason: reason.clone() })
      }
      (Self::Cancelled { reason }, S::InReview) => {
        Some(Transition::Cancel { reason: reason.clone() })
      }
      (Self::Live { rollout_percentage }, S::Approved) => {
        match (PlatformRules::for_submission(current), rollout_percentage) {
          // A phased release cannot start at 100; release at the default
          // and let the next step sync the reported percentage.
          (PlatformRules::Ios { phased_release: true }, Some(p)) if *p >= FULL_ROLLOUT_PERCENT => {
            Some(Transition::Release { rollout_percentage: None })
          }
          _ => Some(Transition::Release { rollout_percentage: *rollout_percentage }),
        }
      }
      (Self::Live { rollout_percentage }, S::Live) => {
        match (PlatformRules::for_submission(current), rollout_percentage) {
          (PlatformRules::Ios { phased_release: false }, _) | (_, None) => None,
          (_, Some(p)) if *p <= current.rollout_percentage => None,
          (_, Some(p)) => Some(Transition::SyncRollout { rollout_percentage: *p }),
        }
      }
      (Self::Live { .. }, S::Paused | S::Halted) => Some(Transition::Resume),
      (Self::Paused, S::Live) => Some(Transition::Pause { reason: STORE_PAUSE_REASON.into() }),
      (Self::Halted, S::Live) => Some(Transition::Halt { reason: STORE_HALT_REASON.into() }),

      (signal, status) => {
        return Err(Error::invalid_transition(format!(
          "store reported {} but the submission is {status}",
          signal.label()
        )));
      }
    };
    Ok(next)
  }

  fn label(&self) -> &'static str {
    match self {
      Self::InReview => "IN_REVIEW",
      Self::Approved => "APPROVED",
      Self::Rejected { .. } => "REJECTED",
      Self::Live { .. } => "LIVE",
      Self::Paused => "PAUSED",
      Self::Halted => "HALTED",
      Self::Cancelled { .. } => "CANCELLED",
    }
  }
}
