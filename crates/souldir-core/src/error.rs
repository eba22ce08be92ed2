//! Error types for `souldir-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The candidate slug (or owner namespace) is malformed.
  #[error("invalid identifier: {0:?}")]
  InvalidIdentifier(String),

  /// The slug exists under the namespace but belongs to a different owner.
  #[error("slug {slug:?} in namespace {namespace:?} is owned by someone else")]
  NamespaceConflict { namespace: String, slug: String },

  /// An explicit version string did not parse as a semantic version.
  #[error("invalid version format: {0:?}")]
  InvalidVersionFormat(String),

  /// The exact version string already exists for this soul.
  #[error("version {version} already exists for soul {soul_id}")]
  VersionAlreadyExists { soul_id: Uuid, version: String },

  #[error("soul not found: {0}")]
  SoulNotFound(Uuid),

  #[error("version {version:?} not found for soul {soul_id}")]
  VersionNotFound { soul_id: Uuid, version: String },

  /// A non-owner attempted an owner-only mutation. Authentication itself is
  /// the caller's concern; this only checks recorded ownership.
  #[error("actor {0} does not own this soul")]
  PermissionDenied(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
