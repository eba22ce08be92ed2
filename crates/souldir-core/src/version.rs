//! Version — one immutable content revision of a soul.
//!
//! Versions are never updated; corrections are new versions. Each carries a
//! semantic version string (unique per soul) and a sequence number (strictly
//! increasing per soul from 1).

use chrono::{DateTime, Utc};
use semver::Version as SemVer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

/// The version assigned to a soul's first publish when no explicit version is
/// given, regardless of the requested bump kind.
pub const FIRST_VERSION: &str = "1.0.0";

// ─── Bump kind ───────────────────────────────────────────────────────────────

/// Which semver component an implicit publish increments.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
  Major,
  Minor,
  #[default]
  Patch,
}

// ─── Changelog ───────────────────────────────────────────────────────────────

/// Whether the changelog text was written by the publisher or generated.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogSource {
  #[default]
  Auto,
  User,
}

/// The generated changelog used when the publisher supplies none.
pub fn default_changelog(first_publish: bool) -> &'static str {
  if first_publish {
    "Initial version"
  } else {
    "Updated content"
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// How this revision's content entered the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
  /// Uploaded through the first-party publish flow.
  #[default]
  Upload,
  /// Imported from an external system.
  External {
    source_name:  String,
    original_url: Option<String>,
  },
}

// ─── Version ─────────────────────────────────────────────────────────────────

/// An immutable content revision. Once written, no field other than
/// `deleted_at` is ever touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
  pub version_id:       Uuid,
  pub soul_id:          Uuid,
  /// `MAJOR.MINOR.PATCH[-pre][+build]`; unique per soul.
  pub semver:           String,
  /// Strictly increasing per soul, starting at 1.
  pub sequence:         i64,
  pub content:          String,
  /// SHA-256 hex digest of the content. Stored for caller-side no-op
  /// detection and integrity checks; identical-fingerprint republish is not
  /// rejected here.
  pub fingerprint:      String,
  pub changelog:        String,
  pub changelog_source: ChangelogSource,
  pub provenance:       Provenance,
  pub created_by:       Uuid,
  pub created_at:       DateTime<Utc>,
  pub deleted_at:       Option<DateTime<Utc>>,
}

/// A version without its content body, for history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
  pub version_id:       Uuid,
  pub soul_id:          Uuid,
  pub semver:           String,
  pub sequence:         i64,
  pub fingerprint:      String,
  pub changelog:        String,
  pub changelog_source: ChangelogSource,
  pub created_by:       Uuid,
  pub created_at:       DateTime<Utc>,
}

// ─── Version math ────────────────────────────────────────────────────────────

/// Parse an explicit version string, mapping parse failures to
/// [`Error::InvalidVersionFormat`].
pub fn parse(raw: &str) -> Result<SemVer> {
  SemVer::parse(raw).map_err(|_| Error::InvalidVersionFormat(raw.to_owned()))
}

/// Derive the next implicit version from the current latest.
///
/// The selected component is incremented and all lower-significance
/// components are zeroed (`1.4.2` + minor → `1.5.0`). Pre-release and build
/// metadata on the latest version are discarded. With no prior version the
/// result is [`FIRST_VERSION`] regardless of `bump`.
pub fn next_version(latest: Option<&str>, bump: BumpKind) -> Result<String> {
  let Some(latest) = latest else {
    return Ok(FIRST_VERSION.to_owned());
  };

  let current = parse(latest)?;
  let next = match bump {
    BumpKind::Major => SemVer::new(current.major + 1, 0, 0),
    BumpKind::Minor => SemVer::new(current.major, current.minor + 1, 0),
    BumpKind::Patch => {
      SemVer::new(current.major, current.minor, current.patch + 1)
    }
  };
  Ok(next.to_string())
}

/// SHA-256 hex fingerprint of a content body.
pub fn fingerprint(content: &str) -> String {
  let digest = Sha256::digest(content.as_bytes());
  hex::encode(digest)
}
