//! Error type for `souldir-store-sqlite`.

use souldir_core::store::AsCoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain-level failure (conflict, not-found, invalid input). Transport
  /// layers recover the taxonomy through [`AsCoreError`].
  #[error("{0}")]
  Core(#[from] souldir_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl AsCoreError for Error {
  fn as_core(&self) -> Option<&souldir_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
