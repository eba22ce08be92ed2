//! Soul — a published, owned, versioned markdown document.
//!
//! The soul row holds identity and denormalized state (latest-version
//! pointer, embedded counters, trending score). Revision content lives in
//! [`crate::version::Version`] rows; the raw activity ledger that backs the
//! counters lives in the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Running counters embedded in each soul. All counters are a cache over the
/// store's append-only event ledger; `versions` always equals the number of
/// non-deleted versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
  pub downloads: u64,
  pub stars:     u64,
  pub upvotes:   u64,
  pub versions:  u64,
  pub comments:  u64,
  pub views:     u64,
}

// ─── Moderation ──────────────────────────────────────────────────────────────

/// Moderation state. `Removed` souls are excluded from listings but still
/// resolve directly — removal is a visibility concern, deletion an existence
/// concern.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
  #[default]
  Active,
  Flagged,
  Removed,
}

// ─── Soul ────────────────────────────────────────────────────────────────────

/// A published document, identified by `(owner_namespace, slug)`.
///
/// The owner never changes after creation. `(owner_namespace, slug)` is
/// unique among non-soft-deleted souls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Soul {
  pub soul_id:           Uuid,
  pub owner_namespace:   String,
  /// The owning account. Distinct from the namespace string so that the
  /// allocator can detect a namespace claimed by someone else.
  pub owner_id:          Uuid,
  pub slug:              String,
  pub name:              String,
  pub tagline:           String,
  pub description:       Option<String>,
  pub category_id:       Option<Uuid>,
  pub tag_ids:           Vec<Uuid>,
  /// Model names this soul has been exercised against; filterable in
  /// listings.
  pub tested_with:       Vec<String>,
  pub latest_version_id: Option<Uuid>,
  /// Write-once fork lineage. Not an enforced foreign key — the upstream may
  /// be soft-deleted later and display degrades to "unavailable".
  pub forked_from:       Option<Uuid>,
  pub stats:             Stats,
  pub featured:          bool,
  /// Batch-computed decayed popularity; `None` until the first scoring run.
  pub trending_score:    Option<f64>,
  pub moderation:        ModerationStatus,
  pub deleted_at:        Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl Soul {
  pub fn is_live(&self) -> bool {
    self.deleted_at.is_none()
  }
}

// ─── Fork lineage ────────────────────────────────────────────────────────────

/// The resolved upstream of a fork, computed at display time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForkOrigin {
  /// The soul was not forked from anything.
  None,
  /// The upstream still exists and is live.
  Available {
    soul_id:         Uuid,
    name:            String,
    owner_namespace: String,
    slug:            String,
  },
  /// The lineage reference is recorded but the upstream is gone or
  /// soft-deleted. Never an error.
  Unavailable,
}

// ─── Daily rollup ────────────────────────────────────────────────────────────

/// Per-soul, per-calendar-day activity aggregate. Created lazily on the first
/// event of the day; the substrate for trending scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRollup {
  pub soul_id:   Uuid,
  pub day:       NaiveDate,
  pub downloads: u64,
  pub views:     u64,
  pub stars:     u64,
}
