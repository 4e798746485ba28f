//! Error type for `launchpad-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] launchpad_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column could not be mapped back onto a domain type.
  #[error("cannot decode column `{column}`: {message}")]
  Decode { column: &'static str, message: String },

  #[error("distribution not found: {0}")]
  DistributionNotFound(uuid::Uuid),
}

impl Error {
  pub(crate) fn decode(column: &'static str, message: impl ToString) -> Self {
    Self::Decode { column, message: message.to_string() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
