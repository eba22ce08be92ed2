//! Ranking math for the two popularity listings.
//!
//! Trending is a batch score: daily rollups folded with exponential decay,
//! recomputed on a schedule and persisted on the soul. Hot is a query-time
//! score: download velocity over two adjacent one-hour windows, never
//! persisted. Both are pure functions here; the store supplies the inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::soul::DailyRollup;

// ─── Sort keys ───────────────────────────────────────────────────────────────

/// The listing sort strategies. Each variant binds to its own ordered index
/// in the store; `Trending` reads a precomputed field and `Hot` is a full
/// recomputation per request (and therefore supports no cursor).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
  /// Most recently updated first.
  #[default]
  Recent,
  /// Most recently created first.
  Published,
  /// Most downloaded first.
  Popular,
  /// Decayed batch score, refreshed hourly.
  Trending,
  /// Most starred first.
  Stars,
  /// Download velocity over the trailing two hours.
  Hot,
}

impl SortKey {
  /// Whether this sort supports keyset pagination.
  pub fn supports_cursor(self) -> bool {
    !matches!(self, SortKey::Hot)
  }
}

// ─── Trending ────────────────────────────────────────────────────────────────

/// Rollups older than this contribute nothing.
pub const TRENDING_WINDOW_DAYS: i64 = 30;
/// A day's activity loses half its weight every seven days.
pub const TRENDING_HALF_LIFE_DAYS: f64 = 7.0;

const DOWNLOAD_WEIGHT: f64 = 1.0;
const VIEW_WEIGHT: f64 = 0.25;
const STAR_WEIGHT: f64 = 2.0;

/// Fold a soul's daily rollups into its decayed trending score.
///
/// Days outside the trailing window (or in the future, which can happen
/// around a clock skew) are skipped. Recomputing with the same inputs yields
/// the same score, so the scheduled job is idempotent.
pub fn trending_score(rollups: &[DailyRollup], today: NaiveDate) -> f64 {
  rollups
    .iter()
    .filter_map(|r| {
      let age_days = (today - r.day).num_days();
      if !(0..TRENDING_WINDOW_DAYS).contains(&age_days) {
        return None;
      }
      let weight = 0.5_f64.powf(age_days as f64 / TRENDING_HALF_LIFE_DAYS);
      let raw = r.downloads as f64 * DOWNLOAD_WEIGHT
        + r.views as f64 * VIEW_WEIGHT
        + r.stars as f64 * STAR_WEIGHT;
      Some(weight * raw)
    })
    .sum()
}

// ─── Hot ─────────────────────────────────────────────────────────────────────

/// One soul's activity in the two trailing one-hour windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotEntry {
  pub soul_id: Uuid,
  /// Downloads in the most recent hour.
  pub count:   u64,
  /// `count` minus downloads in the hour before that. Negative for souls
  /// cooling off.
  pub delta:   i64,
}

/// Order hot entries in place: raw volume first, then acceleration, then
/// soul id so the snapshot is deterministic under equal activity.
pub fn rank_hot(entries: &mut [HotEntry]) {
  entries.sort_by(|a, b| {
    b.count
      .cmp(&a.count)
      .then(b.delta.cmp(&a.delta))
      .then(a.soul_id.cmp(&b.soul_id))
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rollup(soul_id: Uuid, day: NaiveDate, downloads: u64) -> DailyRollup {
    DailyRollup { soul_id, day, downloads, views: 0, stars: 0 }
  }

  fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
  }

  #[test]
  fn recent_activity_outweighs_old() {
    let id = Uuid::new_v4();
    let today = day("2026-08-06");

    let yesterday = trending_score(&[rollup(id, day("2026-08-05"), 10)], today);
    let last_week = trending_score(&[rollup(id, day("2026-07-29"), 10)], today);

    assert!(yesterday > last_week);
    // One half-life apart: the week-old day carries roughly half the weight.
    assert!((last_week * 2.0 - yesterday).abs() < yesterday * 0.15);
  }

  #[test]
  fn days_outside_window_are_ignored() {
    let id = Uuid::new_v4();
    let today = day("2026-08-06");

    let stale = trending_score(&[rollup(id, day("2026-06-01"), 1000)], today);
    assert_eq!(stale, 0.0);

    let future = trending_score(&[rollup(id, day("2026-08-07"), 1000)], today);
    assert_eq!(future, 0.0);
  }

  #[test]
  fn stars_weigh_more_than_views() {
    let id = Uuid::new_v4();
    let today = day("2026-08-06");
    let d = day("2026-08-06");

    let starred = trending_score(
      &[DailyRollup { soul_id: id, day: d, downloads: 0, views: 0, stars: 10 }],
      today,
    );
    let viewed = trending_score(
      &[DailyRollup { soul_id: id, day: d, downloads: 0, views: 10, stars: 0 }],
      today,
    );
    assert!(starred > viewed);
  }

  #[test]
  fn hot_orders_by_count_then_delta() {
    // A: 10 now, 4 before (+6); B: 10 now, 9 before (+1);
    // C: 12 now, 20 before (−8). Expected order: C, A, B.
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    let mut entries = vec![
      HotEntry { soul_id: a, count: 10, delta: 6 },
      HotEntry { soul_id: b, count: 10, delta: 1 },
      HotEntry { soul_id: c, count: 12, delta: -8 },
    ];

    rank_hot(&mut entries);

    let order: Vec<Uuid> = entries.iter().map(|e| e.soul_id).collect();
    assert_eq!(order, vec![c, a, b]);
  }

  #[test]
  fn hot_tie_breaks_on_soul_id() {
    let mut ids = [Uuid::new_v4(), Uuid::new_v4()];
    ids.sort();
    let mut entries = vec![
      HotEntry { soul_id: ids[1], count: 5, delta: 2 },
      HotEntry { soul_id: ids[0], count: 5, delta: 2 },
    ];

    rank_hot(&mut entries);
    assert_eq!(entries[0].soul_id, ids[0]);
  }
}
