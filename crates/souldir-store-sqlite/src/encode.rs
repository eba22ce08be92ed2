//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings (which order correctly under
//! SQLite's text comparison), rollup days as `YYYY-MM-DD`. Structured fields
//! (tag lists, provenance) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, NaiveDate, Utc};
use souldir_core::{
  soul::{ModerationStatus, Soul, Stats},
  version::{ChangelogSource, Provenance, Version, VersionSummary},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_day(day: NaiveDate) -> String {
  day.format("%Y-%m-%d").to_string()
}

pub fn decode_day(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::DateParse(format!("bad day: {s:?}")))
}

// ─── ModerationStatus ────────────────────────────────────────────────────────

pub fn encode_moderation(m: ModerationStatus) -> &'static str {
  match m {
    ModerationStatus::Active => "active",
    ModerationStatus::Flagged => "flagged",
    ModerationStatus::Removed => "removed",
  }
}

pub fn decode_moderation(s: &str) -> Result<ModerationStatus> {
  match s {
    "active" => Ok(ModerationStatus::Active),
    "flagged" => Ok(ModerationStatus::Flagged),
    "removed" => Ok(ModerationStatus::Removed),
    other => Err(Error::DateParse(format!("unknown moderation: {other:?}"))),
  }
}

// ─── ChangelogSource ─────────────────────────────────────────────────────────

pub fn encode_changelog_source(s: ChangelogSource) -> &'static str {
  match s {
    ChangelogSource::Auto => "auto",
    ChangelogSource::User => "user",
  }
}

pub fn decode_changelog_source(s: &str) -> Result<ChangelogSource> {
  match s {
    "auto" => Ok(ChangelogSource::Auto),
    "user" => Ok(ChangelogSource::User),
    other => {
      Err(Error::DateParse(format!("unknown changelog source: {other:?}")))
    }
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

pub fn encode_provenance(p: &Provenance) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_provenance(s: &str) -> Result<Provenance> {
  Ok(serde_json::from_str(s)?)
}

// ─── JSON lists ──────────────────────────────────────────────────────────────

pub fn encode_uuid_list(ids: &[Uuid]) -> Result<String> {
  let strings: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
  Ok(serde_json::to_string(&strings)?)
}

pub fn decode_uuid_list(s: &str) -> Result<Vec<Uuid>> {
  let strings: Vec<String> = serde_json::from_str(s)?;
  strings.iter().map(|s| decode_uuid(s)).collect()
}

pub fn encode_string_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_string_list(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Pagination cursor ───────────────────────────────────────────────────────

/// Keyset cursor: the sort-key values and soul id of the last row on the
/// previous page, carried as raw column values so comparisons in SQL match
/// exactly what was stored.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Cursor {
  pub keys: Vec<serde_json::Value>,
  pub id:   String,
}

pub fn encode_cursor(cursor: &Cursor) -> Result<String> {
  Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(cursor)?))
}

/// Decode an opaque cursor. A token that does not decode is a malformed
/// client-supplied identifier, reported as such.
pub fn decode_cursor(raw: &str) -> Result<Cursor> {
  let bytes = URL_SAFE_NO_PAD
    .decode(raw)
    .map_err(|_| souldir_core::Error::InvalidIdentifier(raw.to_owned()))?;
  serde_json::from_slice(&bytes)
    .map_err(|_| souldir_core::Error::InvalidIdentifier(raw.to_owned()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `souls` row.
pub struct RawSoul {
  pub soul_id:           String,
  pub owner_namespace:   String,
  pub owner_id:          String,
  pub slug:              String,
  pub name:              String,
  pub tagline:           String,
  pub description:       Option<String>,
  pub category_id:       Option<String>,
  pub tag_ids:           String,
  pub tested_with:       String,
  pub latest_version_id: Option<String>,
  pub forked_from:       Option<String>,
  pub downloads:         i64,
  pub stars:             i64,
  pub upvotes:           i64,
  pub versions:          i64,
  pub comments:          i64,
  pub views:             i64,
  pub featured:          bool,
  pub trending_score:    Option<f64>,
  pub moderation:        String,
  pub deleted_at:        Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

/// The `SELECT` list matching [`RawSoul::from_row`]'s column order.
pub const SOUL_COLUMNS: &str = "soul_id, owner_namespace, owner_id, slug, \
   name, tagline, description, category_id, tag_ids, tested_with, \
   latest_version_id, forked_from, downloads, stars, upvotes, versions, \
   comments, views, featured, trending_score, moderation, deleted_at, \
   created_at, updated_at";

impl RawSoul {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      soul_id:           row.get(0)?,
      owner_namespace:   row.get(1)?,
      owner_id:          row.get(2)?,
      slug:              row.get(3)?,
      name:              row.get(4)?,
      tagline:           row.get(5)?,
      description:       row.get(6)?,
      category_id:       row.get(7)?,
      tag_ids:           row.get(8)?,
      tested_with:       row.get(9)?,
      latest_version_id: row.get(10)?,
      forked_from:       row.get(11)?,
      downloads:         row.get(12)?,
      stars:             row.get(13)?,
      upvotes:           row.get(14)?,
      versions:          row.get(15)?,
      comments:          row.get(16)?,
      views:             row.get(17)?,
      featured:          row.get(18)?,
      trending_score:    row.get(19)?,
      moderation:        row.get(20)?,
      deleted_at:        row.get(21)?,
      created_at:        row.get(22)?,
      updated_at:        row.get(23)?,
    })
  }

  pub fn into_soul(self) -> Result<Soul> {
    Ok(Soul {
      soul_id:           decode_uuid(&self.soul_id)?,
      owner_namespace:   self.owner_namespace,
      owner_id:          decode_uuid(&self.owner_id)?,
      slug:              self.slug,
      name:              self.name,
      tagline:           self.tagline,
      description:       self.description,
      category_id:       self
        .category_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      tag_ids:           decode_uuid_list(&self.tag_ids)?,
      tested_with:       decode_string_list(&self.tested_with)?,
      latest_version_id: self
        .latest_version_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      forked_from:       self
        .forked_from
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      stats:             Stats {
        downloads: self.downloads.max(0) as u64,
        stars:     self.stars.max(0) as u64,
        upvotes:   self.upvotes.max(0) as u64,
        versions:  self.versions.max(0) as u64,
        comments:  self.comments.max(0) as u64,
        views:     self.views.max(0) as u64,
      },
      featured:          self.featured,
      trending_score:    self.trending_score,
      moderation:        decode_moderation(&self.moderation)?,
      deleted_at:        self.deleted_at.as_deref().map(decode_dt).transpose()?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a full `versions` row.
pub struct RawVersion {
  pub version_id:       String,
  pub soul_id:          String,
  pub semver:           String,
  pub sequence:         i64,
  pub content:          String,
  pub fingerprint:      String,
  pub changelog:        String,
  pub changelog_source: String,
  pub provenance:       String,
  pub created_by:       String,
  pub created_at:       String,
  pub deleted_at:       Option<String>,
}

pub const VERSION_COLUMNS: &str = "version_id, soul_id, semver, sequence, \
   content, fingerprint, changelog, changelog_source, provenance, \
   created_by, created_at, deleted_at";

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:       row.get(0)?,
      soul_id:          row.get(1)?,
      semver:           row.get(2)?,
      sequence:         row.get(3)?,
      content:          row.get(4)?,
      fingerprint:      row.get(5)?,
      changelog:        row.get(6)?,
      changelog_source: row.get(7)?,
      provenance:       row.get(8)?,
      created_by:       row.get(9)?,
      created_at:       row.get(10)?,
      deleted_at:       row.get(11)?,
    })
  }

  pub fn into_version(self) -> Result<Version> {
    Ok(Version {
      version_id:       decode_uuid(&self.version_id)?,
      soul_id:          decode_uuid(&self.soul_id)?,
      semver:           self.semver,
      sequence:         self.sequence,
      content:          self.content,
      fingerprint:      self.fingerprint,
      changelog:        self.changelog,
      changelog_source: decode_changelog_source(&self.changelog_source)?,
      provenance:       decode_provenance(&self.provenance)?,
      created_by:       decode_uuid(&self.created_by)?,
      created_at:       decode_dt(&self.created_at)?,
      deleted_at:       self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings for a history listing — everything but the content body.
pub struct RawVersionSummary {
  pub version_id:       String,
  pub soul_id:          String,
  pub semver:           String,
  pub sequence:         i64,
  pub fingerprint:      String,
  pub changelog:        String,
  pub changelog_source: String,
  pub created_by:       String,
  pub created_at:       String,
}

pub const VERSION_SUMMARY_COLUMNS: &str = "version_id, soul_id, semver, \
   sequence, fingerprint, changelog, changelog_source, created_by, created_at";

impl RawVersionSummary {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:       row.get(0)?,
      soul_id:          row.get(1)?,
      semver:           row.get(2)?,
      sequence:         row.get(3)?,
      fingerprint:      row.get(4)?,
      changelog:        row.get(5)?,
      changelog_source: row.get(6)?,
      created_by:       row.get(7)?,
      created_at:       row.get(8)?,
    })
  }

  pub fn into_summary(self) -> Result<VersionSummary> {
    Ok(VersionSummary {
      version_id:       decode_uuid(&self.version_id)?,
      soul_id:          decode_uuid(&self.soul_id)?,
      semver:           self.semver,
      sequence:         self.sequence,
      fingerprint:      self.fingerprint,
      changelog:        self.changelog,
      changelog_source: decode_changelog_source(&self.changelog_source)?,
      created_by:       decode_uuid(&self.created_by)?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}
