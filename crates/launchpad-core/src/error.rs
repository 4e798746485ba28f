//! Error types for `launchpad-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A request field is missing or malformed.
  #[error("invalid `{field}`: {message}")]
  Validation { field: String, message: String },

  /// The submission's current status does not permit the requested action.
  #[error("invalid transition: {0}")]
  InvalidTransition(String),

  #[error("{0} not found")]
  NotFound(String),

  /// The caller did not identify an actor.
  #[error("unauthorized: {0}")]
  Authorization(String),

  /// Optimistic-concurrency retries were exhausted. `entity` names the row
  /// that kept changing (`submission` or `distribution`).
  #[error("{entity} {id} was modified concurrently; retry the request")]
  Conflict { entity: &'static str, id: Uuid },

  /// A collaborator (e.g. the artifact store) failed.
  #[error("{dependency} failed: {source}")]
  ExternalDependency {
    dependency: &'static str,
    #[source]
    source:     Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Validation { field: field.into(), message: message.into() }
  }

  pub fn invalid_transition(message: impl Into<String>) -> Self {
    Self::InvalidTransition(message.into())
  }

  pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }

  pub fn conflict(entity: &'static str, id: Uuid) -> Self { Self::Conflict { entity, id } }

  /// Stable machine-readable code used in API error bodies.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Validation { .. } => "VALIDATION_ERROR",
      Self::InvalidTransition(_) => "INVALID_TRANSITION",
      Self::NotFound(_) => "NOT_FOUND",
      Self::Authorization(_) => "UNAUTHORIZED",
      Self::Conflict { .. } => "CONFLICT",
      Self::ExternalDependency { .. } => "EXTERNAL_DEPENDENCY",
      Self::Store(_) => "INTERNAL_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
