//! Platforms and the platform-specific rollout rule sets.
//!
//! Android and iOS disagree on almost every rollout control. Rather than
//! branching on the platform at each call site, the rules live in one tagged
//! union, [`PlatformRules`], and every caller selects a variant by pattern
//! match. Neither variant can see the other's constraints.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  submission::{PlatformDetails, Submission, SubmissionStatus},
};

/// Initial rollout used when an iOS phased release goes live without an
/// explicit percentage. Apple starts phased releases at day one (1%).
pub const IOS_PHASED_INITIAL_PERCENT: f64 = 1.0;

/// The only target an iOS phased release may be moved to by hand.
pub const FULL_ROLLOUT_PERCENT: f64 = 100.0;

// ─── Platform ────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
  Android,
  Ios,
}

impl Platform {
  /// The store a submission for this platform is sent to.
  pub fn store_type(self) -> StoreType {
    match self {
      Self::Android => StoreType::PlayStore,
      Self::Ios => StoreType::AppStore,
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreType {
  PlayStore,
  AppStore,
}

// ─── Percentages ─────────────────────────────────────────────────────────────

/// Reject non-finite values and anything outside `[0, 100]`.
pub fn validate_percentage(field: &str, value: f64) -> Result<f64> {
  if !value.is_finite() {
    return Err(Error::validation(field, "must be a number"));
  }
  if !(0.0..=FULL_ROLLOUT_PERCENT).contains(&value) {
    return Err(Error::validation(field, format!("{value} is outside 0-100")));
  }
  Ok(value)
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// Platform-specific rollout rules, selected from a submission's details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformRules {
  /// Play staged rollouts: any strictly increasing percentage; halt/resume.
  Android,
  /// App Store releases: manual (fixed at 100%) or phased (pause/resume,
  /// early completion to 100% only).
  Ios { phased_release: bool },
}

impl PlatformRules {
  pub fn for_submission(submission: &Submission) -> Self {
    match &submission.details {
      PlatformDetails::Android { .. } => Self::Android,
      PlatformDetails::Ios { phased_release, .. } => Self::Ios {
        phased_release: phased_release.unwrap_or(false),
      },
    }
  }

  pub fn platform(self) -> Platform {
    match self {
      Self::Android => Platform::Android,
      Self::Ios { .. } => Platform::Ios,
    }
  }

  /// Check a manual rollout-percentage change against the rule table.
  pub fn validate_rollout_update(
    self,
    status: SubmissionStatus,
    current: f64,
    target: f64,
  ) -> Result<()> {
    match self {
      Self::Ios { phased_release: false } => {
        return Err(Error::invalid_transition(
          "iOS manual releases are fixed at 100% and cannot be updated",
        ));
      }
      Self::Ios { phased_release: true } if current >= FULL_ROLLOUT_PERCENT => {
        return Err(Error::invalid_transition(
          "iOS phased release is already complete",
        ));
      }
      _ => {}
    }

    if status != SubmissionStatus::Live {
      return Err(Error::invalid_transition(format!(
        "rollout can only be updated while LIVE (currently {status})"
      )));
    }

    validate_percentage("rolloutPercentage", target)?;
    if target <= current {
      return Err(Error::validation(
        "rolloutPercentage",
        format!("{target} must be greater than the current {current}"),
      ));
    }

    if let Self::Ios { phased_release: true } = self
      && target != FULL_ROLLOUT_PERCENT
    {
      return Err(Error::validation(
        "rolloutPercentage",
        "an iOS phased release can only be completed early by setting 100",
      ));
    }

    Ok(())
  }

  /// Check whether a LIVE rollout may be stopped, returning the status it
  /// moves to (`PAUSED` on iOS, `HALTED` on Android).
  pub fn validate_pause(
    self,
    status: SubmissionStatus,
    current: f64,
  ) -> Result<SubmissionStatus> {
    if status != SubmissionStatus::Live {
      return Err(Error::invalid_transition(format!(
        "only a LIVE rollout can be paused (currently {status})"
      )));
    }
    match self {
      Self::Android => Ok(SubmissionStatus::Halted),
      Self::Ios { phased_release: false } => Err(Error::invalid_transition(
        "iOS manual releases cannot be paused",
      )),
      Self::Ios { phased_release: true } if current >= FULL_ROLLOUT_PERCENT => {
        Err(Error::invalid_transition(
          "iOS phased release is already complete and cannot be paused",
        ))
      }
      Self::Ios { phased_release: true } => Ok(SubmissionStatus::Paused),
    }
  }

  /// The stopped status that `resume` returns to LIVE from.
  pub fn resumable_from(self) -> SubmissionStatus {
    match self {
      Self::Android => SubmissionStatus::Halted,
      Self::Ios { .. } => SubmissionStatus::Paused,
    }
  }

  /// Rollout percentage a submission starts with when it goes LIVE.
  ///
  /// `stored` is the percentage already on the row (Android records the
  /// requested initial rollout at submit time).
  pub fn initial_rollout_on_live(
    self,
    requested: Option<f64>,
    stored: f64,
  ) -> Result<f64> {
    match self {
      Self::Android => match requested {
        Some(p) => validate_percentage("rolloutPercentage", p),
        None => Ok(stored),
      },
      Self::Ios { phased_release: false } => Ok(FULL_ROLLOUT_PERCENT),
      Self::Ios { phased_release: true } => {
        let p = validate_percentage(
          "rolloutPercentage",
          requested.unwrap_or(IOS_PHASED_INITIAL_PERCENT),
        )?;
        if p >= FULL_ROLLOUT_PERCENT {
          return Err(Error::validation(
            "rolloutPercentage",
            "an iOS phased release must start below 100",
          ));
        }
        Ok(p)
      }
    }
  }

  /// Cancelling an in-review submission is only wired up for the App Store.
  pub fn validate_cancel(self) -> Result<()> {
    match self {
      Self::Ios { .. } => Ok(()),
      Self::Android => Err(Error::invalid_transition(
        "Android submissions cannot be cancelled while in review",
      )),
    }
  }

  /// Check a store-reported percentage for a LIVE submission. Store sync may
  /// move a phased release through intermediate steps, but never backwards.
  pub fn validate_store_sync(self, current: f64, reported: f64) -> Result<()> {
    if let Self::Ios { phased_release: false } = self {
      return Err(Error::invalid_transition(
        "iOS manual releases are fixed at 100%",
      ));
    }
    validate_percentage("rolloutPercentage", reported)?;
    if reported <= current {
      return Err(Error::validation(
        "rolloutPercentage",
        format!("store reported {reported}, not above the current {current}"),
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use SubmissionStatus::*;

  const ANDROID: PlatformRules = PlatformRules::Android;
  const PHASED: PlatformRules = PlatformRules::Ios { phased_release: true };
  const MANUAL: PlatformRules = PlatformRules::Ios { phased_release: false };

  #[test]
  fn platform_names_are_screaming_case() {
    assert_eq!(Platform::Ios.to_string(), "IOS");
    assert_eq!("ANDROID".parse::<Platform>().unwrap(), Platform::Android);
    assert_eq!(serde_json::to_string(&StoreType::PlayStore).unwrap(), "\"PLAY_STORE\"");
  }

  #[test]
  fn android_accepts_any_strict_increase() {
    assert!(ANDROID.validate_rollout_update(Live, 10.0, 10.5).is_ok());
    assert!(ANDROID.validate_rollout_update(Live, 0.0, 100.0).is_ok());
  }

  #[test]
  fn android_rejects_equal_or_lower_target() {
    for target in [10.0, 5.0] {
      let err = ANDROID.validate_rollout_update(Live, 10.0, target).unwrap_err();
      assert!(matches!(err, Error::Validation { .. }), "{err}");
    }
  }

  #[test]
  fn out_of_range_or_nan_is_validation() {
    for target in [f64::NAN, 100.1, -1.0, f64::INFINITY] {
      let err = ANDROID.validate_rollout_update(Live, 10.0, target).unwrap_err();
      assert!(matches!(err, Error::Validation { .. }), "{target}: {err}");
    }
  }

  #[test]
  fn ios_phased_only_completes_to_100() {
    assert!(PHASED.validate_rollout_update(Live, 20.0, 100.0).is_ok());
    let err = PHASED.validate_rollout_update(Live, 20.0, 50.0).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
  }

  #[test]
  fn ios_phased_at_100_cannot_update_or_pause() {
    assert!(matches!(
      PHASED.validate_rollout_update(Live, 100.0, 100.0),
      Err(Error::InvalidTransition(_))
    ));
    assert!(matches!(
      PHASED.validate_pause(Live, 100.0),
      Err(Error::InvalidTransition(_))
    ));
  }

  #[test]
  fn ios_manual_never_updates() {
    assert!(matches!(
      MANUAL.validate_rollout_update(Live, 100.0, 100.0),
      Err(Error::InvalidTransition(_))
    ));
    assert!(matches!(
      MANUAL.validate_rollout_update(Approved, 100.0, 100.0),
      Err(Error::InvalidTransition(_))
    ));
  }

  #[test]
  fn update_requires_live() {
    for status in [Paused, Halted, Approved, InReview] {
      assert!(matches!(
        ANDROID.validate_rollout_update(status, 10.0, 20.0),
        Err(Error::InvalidTransition(_))
      ));
    }
  }

  #[test]
  fn pause_targets_are_platform_specific() {
    assert_eq!(ANDROID.validate_pause(Live, 5.0).unwrap(), Halted);
    assert_eq!(PHASED.validate_pause(Live, 5.0).unwrap(), Paused);
    assert!(matches!(MANUAL.validate_pause(Live, 100.0), Err(Error::InvalidTransition(_))));
    assert!(matches!(ANDROID.validate_pause(Halted, 5.0), Err(Error::InvalidTransition(_))));
  }

  #[test]
  fn initial_rollout_on_live() {
    assert_eq!(MANUAL.initial_rollout_on_live(Some(5.0), 0.0).unwrap(), 100.0);
    assert_eq!(PHASED.initial_rollout_on_live(None, 0.0).unwrap(), 1.0);
    assert_eq!(PHASED.initial_rollout_on_live(Some(2.0), 0.0).unwrap(), 2.0);
    assert!(PHASED.initial_rollout_on_live(Some(100.0), 0.0).is_err());
    assert_eq!(ANDROID.initial_rollout_on_live(None, 20.0).unwrap(), 20.0);
    assert_eq!(ANDROID.initial_rollout_on_live(Some(0.5), 20.0).unwrap(), 0.5);
    assert!(ANDROID.initial_rollout_on_live(Some(101.0), 20.0).is_err());
  }

  #[test]
  fn cancel_is_ios_only() {
    assert!(PHASED.validate_cancel().is_ok());
    assert!(MANUAL.validate_cancel().is_ok());
    assert!(matches!(ANDROID.validate_cancel(), Err(Error::InvalidTransition(_))));
  }

  #[test]
  fn store_sync_is_monotonic() {
    assert!(PHASED.validate_store_sync(2.0, 5.0).is_ok());
    assert!(PHASED.validate_store_sync(5.0, 2.0).is_err());
    assert!(MANUAL.validate_store_sync(100.0, 100.0).is_err());
  }
}
