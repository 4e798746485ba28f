//! Core types and rules for the Launchpad release-distribution tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the submission state machine, the platform rollout rules, the distribution
//! aggregate, and the store/artifact traits the outer crates implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod artifact;
pub mod distribution;
pub mod error;
pub mod history;
pub mod platform;
pub mod rollout;
pub mod service;
pub mod signal;
pub mod store;
pub mod submission;
pub mod transition;

pub use error::{Error, Result};

use chrono::{DateTime, SubsecRound, Utc};

/// The current time, truncated to the microsecond precision stores persist.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }
