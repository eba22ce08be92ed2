//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use rusqlite::params;
use souldir_core::{
  rank::SortKey,
  soul::ForkOrigin,
  store::{PublishRequest, SoulQuery, SoulStore},
  version::BumpKind,
};
use uuid::Uuid;

use crate::{
  SqliteStore,
  encode::{encode_day, encode_dt, encode_uuid},
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn req(namespace: &str, slug: &str, actor: Uuid) -> PublishRequest {
  PublishRequest::new(namespace, slug, actor, "Test Soul", "# content\n")
}

/// Read `(stats.versions, COUNT of non-deleted version rows)` for the
/// invariant checks.
async fn version_counts(s: &SqliteStore, soul_id: Uuid) -> (u64, i64) {
  let soul = s.get_soul(soul_id).await.unwrap().unwrap();
  let id_str = encode_uuid(soul_id);
  let actual: i64 = s
    .raw_call(move |conn| {
      conn.query_row(
        "SELECT COUNT(*) FROM versions WHERE soul_id = ?1 AND deleted_at IS NULL",
        params![id_str],
        |row| row.get(0),
      )
    })
    .await
    .unwrap();
  (soul.stats.versions, actual)
}

/// Insert anonymous download events `minutes_ago`, bypassing counters — for
/// shaping the hot window.
async fn seed_downloads(
  s: &SqliteStore,
  soul_id: Uuid,
  minutes_ago: i64,
  n: usize,
) {
  let id_str = encode_uuid(soul_id);
  let at = encode_dt(Utc::now() - Duration::minutes(minutes_ago));
  s.raw_call(move |conn| {
      for _ in 0..n {
        conn.execute(
          "INSERT INTO download_events (event_id, soul_id, actor_id, created_at)
           VALUES (?1, ?2, NULL, ?3)",
          params![encode_uuid(Uuid::new_v4()), id_str, at],
        )?;
      }
      Ok(())
    })
    .await
    .unwrap();
}

// ─── Publish: first version ──────────────────────────────────────────────────

#[tokio::test]
async fn first_publish_creates_soul_at_1_0_0() {
  let s = store().await;
  let actor = Uuid::new_v4();

  let out = s.publish(req("alice", "coach", actor)).await.unwrap();
  assert!(out.is_new_soul);
  assert_eq!(out.resolved_version, "1.0.0");

  let soul = s.resolve_soul("alice", "coach").await.unwrap().unwrap();
  assert_eq!(soul.soul_id, out.soul_id);
  assert_eq!(soul.owner_id, actor);
  assert_eq!(soul.latest_version_id, Some(out.version_id));
  assert_eq!(soul.stats.versions, 1);

  let versions = s.list_versions(out.soul_id).await.unwrap();
  assert_eq!(versions.len(), 1);
  assert_eq!(versions[0].sequence, 1);
  assert_eq!(versions[0].semver, "1.0.0");
}

#[tokio::test]
async fn first_publish_ignores_bump_kind() {
  let s = store().await;
  let mut request = req("alice", "coach", Uuid::new_v4());
  request.bump = BumpKind::Major;

  let out = s.publish(request).await.unwrap();
  assert_eq!(out.resolved_version, "1.0.0");
}

#[tokio::test]
async fn publish_normalizes_identifiers() {
  let s = store().await;
  let out = s
    .publish(req("  Alice ", " Coach ", Uuid::new_v4()))
    .await
    .unwrap();

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.owner_namespace, "alice");
  assert_eq!(soul.slug, "coach");
}

#[tokio::test]
async fn publish_rejects_malformed_slug() {
  let s = store().await;
  let err = s
    .publish(req("alice", "not a slug!", Uuid::new_v4()))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(souldir_core::Error::InvalidIdentifier(_))
  ));
}

// ─── Publish: republish and bumps ────────────────────────────────────────────

#[tokio::test]
async fn republish_appends_and_follows_bump_table() {
  let s = store().await;
  let actor = Uuid::new_v4();

  let mut first = req("alice", "coach", actor);
  first.explicit_version = Some("1.4.2".into());
  let out = s.publish(first).await.unwrap();

  let mut patch = req("alice", "coach", actor);
  patch.bump = BumpKind::Patch;
  assert_eq!(s.publish(patch).await.unwrap().resolved_version, "1.4.3");

  let mut minor = req("alice", "coach", actor);
  minor.bump = BumpKind::Minor;
  assert_eq!(s.publish(minor).await.unwrap().resolved_version, "1.5.0");

  let mut major = req("alice", "coach", actor);
  major.bump = BumpKind::Major;
  let last = s.publish(major).await.unwrap();
  assert_eq!(last.resolved_version, "2.0.0");
  assert!(!last.is_new_soul);
  assert_eq!(last.soul_id, out.soul_id);

  // Sequences stay gapless and strictly increasing, newest first.
  let versions = s.list_versions(out.soul_id).await.unwrap();
  let seqs: Vec<i64> = versions.iter().map(|v| v.sequence).collect();
  assert_eq!(seqs, vec![4, 3, 2, 1]);

  let (stat, actual) = version_counts(&s, out.soul_id).await;
  assert_eq!(stat, 4);
  assert_eq!(actual, 4);
}

#[tokio::test]
async fn republish_updates_latest_pointer_and_metadata() {
  let s = store().await;
  let actor = Uuid::new_v4();
  s.publish(req("alice", "coach", actor)).await.unwrap();

  let mut second = req("alice", "coach", actor);
  second.name = "Renamed Soul".into();
  second.tagline = "sharper".into();
  let out = s.publish(second).await.unwrap();

  let soul = s.resolve_soul("alice", "coach").await.unwrap().unwrap();
  assert_eq!(soul.latest_version_id, Some(out.version_id));
  assert_eq!(soul.name, "Renamed Soul");
  assert_eq!(soul.tagline, "sharper");
}

#[tokio::test]
async fn identical_content_republish_is_not_deduplicated() {
  let s = store().await;
  let actor = Uuid::new_v4();
  s.publish(req("alice", "coach", actor)).await.unwrap();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();

  // Same fingerprint, still a new version; the fingerprint is stored for
  // caller-side no-op detection only.
  assert_eq!(out.resolved_version, "1.0.1");
  let versions = s.list_versions(out.soul_id).await.unwrap();
  assert_eq!(versions.len(), 2);
  assert_eq!(versions[0].fingerprint, versions[1].fingerprint);
}

// ─── Publish: explicit versions ──────────────────────────────────────────────

#[tokio::test]
async fn explicit_version_duplicate_fails_per_soul() {
  let s = store().await;
  let actor = Uuid::new_v4();

  let mut first = req("alice", "coach", actor);
  first.explicit_version = Some("2.0.0".into());
  s.publish(first).await.unwrap();

  let mut dup = req("alice", "coach", actor);
  dup.explicit_version = Some("2.0.0".into());
  let err = s.publish(dup).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(souldir_core::Error::VersionAlreadyExists { .. })
  ));

  // The same string under a different soul is fine — version strings are
  // scoped per soul.
  let mut other = req("alice", "mentor", actor);
  other.explicit_version = Some("2.0.0".into());
  assert!(s.publish(other).await.is_ok());
}

#[tokio::test]
async fn explicit_version_must_parse() {
  let s = store().await;
  let mut request = req("alice", "coach", Uuid::new_v4());
  request.explicit_version = Some("not-a-version".into());

  let err = s.publish(request).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(souldir_core::Error::InvalidVersionFormat(_))
  ));

  // Nothing was created: the failed mutation left no partial state.
  assert!(s.resolve_soul("alice", "coach").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_publish_moves_no_counters() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();

  let mut bad = req("alice", "coach", actor);
  bad.explicit_version = Some("1.0.0".into());
  s.publish(bad).await.unwrap_err();

  let (stat, actual) = version_counts(&s, out.soul_id).await;
  assert_eq!(stat, 1);
  assert_eq!(actual, 1);
}

// ─── Namespace allocation ────────────────────────────────────────────────────

#[tokio::test]
async fn two_owners_may_use_the_same_slug() {
  let s = store().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  let a = s.publish(req("alice", "coach", alice)).await.unwrap();
  let b = s.publish(req("bob", "coach", bob)).await.unwrap();

  assert_ne!(a.soul_id, b.soul_id);
  assert!(a.is_new_soul && b.is_new_soul);
}

#[tokio::test]
async fn publishing_into_foreign_namespace_conflicts() {
  let s = store().await;
  s.publish(req("alice", "coach", Uuid::new_v4())).await.unwrap();

  let err = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(souldir_core::Error::NamespaceConflict { .. })
  ));
}

#[tokio::test]
async fn check_slug_reports_ownership() {
  let s = store().await;
  let alice = Uuid::new_v4();
  s.publish(req("alice", "coach", alice)).await.unwrap();

  let free = s.check_slug("alice", "mentor", Some(alice)).await.unwrap();
  assert!(free.available);
  assert!(free.current_version_count.is_none());

  let own = s.check_slug("alice", "coach", Some(alice)).await.unwrap();
  assert!(!own.available);
  assert!(own.is_owner_already);
  assert_eq!(own.current_version_count, Some(1));

  let other = s
    .check_slug("alice", "coach", Some(Uuid::new_v4()))
    .await
    .unwrap();
  assert!(!other.available);
  assert!(!other.is_owner_already);
}

// ─── Soft delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_cascades_to_versions() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();
  s.publish(req("alice", "coach", actor)).await.unwrap();

  s.soft_delete_soul(out.soul_id, actor).await.unwrap();

  // Gone from resolution; history rows preserved but marked.
  assert!(s.resolve_soul("alice", "coach").await.unwrap().is_none());
  assert!(s.get_version(out.soul_id, "1.0.0").await.unwrap().is_none());

  let (stat, actual) = version_counts(&s, out.soul_id).await;
  assert_eq!(stat, 0);
  assert_eq!(actual, 0);

  // The namespace is free again for a fresh soul.
  let again = s.publish(req("alice", "coach", actor)).await.unwrap();
  assert!(again.is_new_soul);
  assert_ne!(again.soul_id, out.soul_id);
}

#[tokio::test]
async fn soft_delete_requires_ownership() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();

  let err = s
    .soft_delete_soul(out.soul_id, Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(souldir_core::Error::PermissionDenied(_))
  ));
}

#[tokio::test]
async fn soft_delete_version_recounts_and_repoints() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let first = s.publish(req("alice", "coach", actor)).await.unwrap();
  let second = s.publish(req("alice", "coach", actor)).await.unwrap();

  s.soft_delete_version(first.soul_id, "1.0.1", actor)
    .await
    .unwrap();

  let soul = s.get_soul(first.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.versions, 1);
  // Latest pointer falls back to the highest remaining sequence.
  assert_eq!(soul.latest_version_id, Some(first.version_id));
  assert_ne!(soul.latest_version_id, Some(second.version_id));

  let (stat, actual) = version_counts(&s, first.soul_id).await;
  assert_eq!(stat, actual as u64);

  // Numbering moves forward past the deleted version — its string is never
  // reissued, and sequences never reuse a slot.
  let next = s.publish(req("alice", "coach", actor)).await.unwrap();
  assert_eq!(next.resolved_version, "1.0.2");
  let versions = s.list_versions(first.soul_id).await.unwrap();
  let seqs: Vec<i64> = versions.iter().map(|v| v.sequence).collect();
  assert_eq!(seqs, vec![3, 1]);
}

// ─── Versions: reads ─────────────────────────────────────────────────────────

#[tokio::test]
async fn get_version_returns_content_and_provenance() {
  let s = store().await;
  let mut request = req("alice", "coach", Uuid::new_v4());
  request.changelog = Some("hand-written notes".into());
  request.provenance = souldir_core::version::Provenance::External {
    source_name:  "legacy-archive".into(),
    original_url: Some("https://example.com/coach.md".into()),
  };
  let out = s.publish(request).await.unwrap();

  let version = s
    .get_version(out.soul_id, "1.0.0")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(version.content, "# content\n");
  assert_eq!(version.changelog, "hand-written notes");
  assert_eq!(
    version.changelog_source,
    souldir_core::version::ChangelogSource::User
  );
  assert!(matches!(
    version.provenance,
    souldir_core::version::Provenance::External { ref source_name, .. }
      if source_name == "legacy-archive"
  ));
}

#[tokio::test]
async fn omitted_changelog_is_autogenerated() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();
  s.publish(req("alice", "coach", actor)).await.unwrap();

  let versions = s.list_versions(out.soul_id).await.unwrap();
  assert_eq!(versions[1].changelog, "Initial version");
  assert_eq!(versions[0].changelog, "Updated content");
  assert!(versions.iter().all(|v| {
    v.changelog_source == souldir_core::version::ChangelogSource::Auto
  }));
}

#[tokio::test]
async fn list_versions_unknown_soul_errors() {
  let s = store().await;
  let err = s.list_versions(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(souldir_core::Error::SoulNotFound(_))
  ));
}

// ─── Fork lineage ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fork_origin_degrades_when_upstream_is_deleted() {
  let s = store().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  let upstream = s.publish(req("alice", "coach", alice)).await.unwrap();

  let mut fork = req("bob", "coach", bob);
  fork.forked_from = Some(upstream.soul_id);
  let forked = s.publish(fork).await.unwrap();

  assert!(matches!(
    s.resolve_fork_origin(forked.soul_id).await.unwrap(),
    ForkOrigin::Available { soul_id, .. } if soul_id == upstream.soul_id
  ));

  s.soft_delete_soul(upstream.soul_id, alice).await.unwrap();

  // Lineage lookup still succeeds; the upstream is merely unavailable.
  assert!(matches!(
    s.resolve_fork_origin(forked.soul_id).await.unwrap(),
    ForkOrigin::Unavailable
  ));
}

#[tokio::test]
async fn fork_origin_of_a_root_soul_is_none() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();
  assert!(matches!(
    s.resolve_fork_origin(out.soul_id).await.unwrap(),
    ForkOrigin::None
  ));
}

// ─── Downloads ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn authenticated_downloads_deduplicate_within_a_day() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();

  let first = s
    .track_download("alice", "coach", Some(actor))
    .await
    .unwrap();
  assert!(first.success && !first.deduplicated);

  let second = s
    .track_download("alice", "coach", Some(actor))
    .await
    .unwrap();
  assert!(second.success && second.deduplicated);

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.downloads, 1);
}

#[tokio::test]
async fn dedup_window_expires_after_24_hours() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();
  s.track_download("alice", "coach", Some(actor)).await.unwrap();

  // Age the prior event past the window.
  let id_str = encode_uuid(out.soul_id);
  let stale = encode_dt(Utc::now() - Duration::hours(25));
  s.raw_call(move |conn| {
      conn.execute(
        "UPDATE download_events SET created_at = ?2 WHERE soul_id = ?1",
        params![id_str, stale],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let again = s
    .track_download("alice", "coach", Some(actor))
    .await
    .unwrap();
  assert!(!again.deduplicated);

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.downloads, 2);
}

#[tokio::test]
async fn anonymous_downloads_always_count() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();

  s.track_download("alice", "coach", None).await.unwrap();
  s.track_download("alice", "coach", None).await.unwrap();

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.downloads, 2);
}

#[tokio::test]
async fn download_against_missing_soul_reports_failure() {
  let s = store().await;
  let outcome = s.track_download("alice", "ghost", None).await.unwrap();
  assert!(!outcome.success);
  assert!(!outcome.deduplicated);
}

#[tokio::test]
async fn downloads_feed_the_daily_rollup() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();
  s.track_download("alice", "coach", None).await.unwrap();
  s.track_download("alice", "coach", None).await.unwrap();

  let id_str = encode_uuid(out.soul_id);
  let today = encode_day(Utc::now().date_naive());
  let rolled: i64 = s
    .raw_call(move |conn| {
      conn.query_row(
        "SELECT downloads FROM daily_rollups WHERE soul_id = ?1 AND day = ?2",
        params![id_str, today],
        |row| row.get(0),
      )
    })
    .await
    .unwrap();
  assert_eq!(rolled, 2);
}

// ─── Stars and upvotes ───────────────────────────────────────────────────────

#[tokio::test]
async fn star_unstar_restores_the_counter() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();

  assert!(s.toggle_star(out.soul_id, actor).await.unwrap());
  let starred = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(starred.stats.stars, 1);

  assert!(!s.toggle_star(out.soul_id, actor).await.unwrap());
  let unstarred = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(unstarred.stats.stars, 0);
}

#[tokio::test]
async fn unstar_with_drifted_counter_clamps_at_zero() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let out = s.publish(req("alice", "coach", actor)).await.unwrap();

  // Simulate cache drift: membership exists but the counter was never
  // bumped. The decrement must not go negative.
  let id_str = encode_uuid(out.soul_id);
  let actor_str = encode_uuid(actor);
  let now = encode_dt(Utc::now());
  s.raw_call(move |conn| {
      conn.execute(
        "INSERT INTO stars (soul_id, actor_id, created_at) VALUES (?1, ?2, ?3)",
        params![id_str, actor_str, now],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  assert!(!s.toggle_star(out.soul_id, actor).await.unwrap());
  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.stars, 0);
}

#[tokio::test]
async fn upvote_toggles_per_actor() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();
  let voter_a = Uuid::new_v4();
  let voter_b = Uuid::new_v4();

  assert!(s.toggle_upvote(out.soul_id, voter_a).await.unwrap());
  assert!(s.toggle_upvote(out.soul_id, voter_b).await.unwrap());
  assert!(!s.toggle_upvote(out.soul_id, voter_a).await.unwrap());

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.upvotes, 1);
}

// ─── Views and comments ──────────────────────────────────────────────────────

#[tokio::test]
async fn views_count_and_roll_up() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();

  s.track_view("alice", "coach").await.unwrap();
  s.track_view("alice", "coach").await.unwrap();
  // Missing soul: silent no-op.
  s.track_view("alice", "ghost").await.unwrap();

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.views, 2);
}

#[tokio::test]
async fn comment_counter_clamps_at_zero() {
  let s = store().await;
  let out = s
    .publish(req("alice", "coach", Uuid::new_v4()))
    .await
    .unwrap();

  s.adjust_comments(out.soul_id, 1).await.unwrap();
  s.adjust_comments(out.soul_id, -1).await.unwrap();
  s.adjust_comments(out.soul_id, -1).await.unwrap();

  let soul = s.get_soul(out.soul_id).await.unwrap().unwrap();
  assert_eq!(soul.stats.comments, 0);
}

// ─── Listings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn popular_sort_orders_by_downloads() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let quiet = s.publish(req("alice", "quiet", actor)).await.unwrap();
  let busy = s.publish(req("alice", "busy", actor)).await.unwrap();

  s.track_download("alice", "busy", None).await.unwrap();
  s.track_download("alice", "busy", None).await.unwrap();
  s.track_download("alice", "quiet", None).await.unwrap();

  let page = s
    .list_souls(&SoulQuery { sort: SortKey::Popular, ..Default::default() })
    .await
    .unwrap();
  let ids: Vec<Uuid> = page.souls.iter().map(|s| s.soul_id).collect();
  assert_eq!(ids, vec![busy.soul_id, quiet.soul_id]);
}

#[tokio::test]
async fn listing_excludes_deleted_and_removed() {
  let s = store().await;
  let actor = Uuid::new_v4();
  s.publish(req("alice", "kept", actor)).await.unwrap();
  let deleted = s.publish(req("alice", "deleted", actor)).await.unwrap();
  let removed = s.publish(req("alice", "removed", actor)).await.unwrap();

  s.soft_delete_soul(deleted.soul_id, actor).await.unwrap();
  let removed_id = encode_uuid(removed.soul_id);
  s.raw_call(move |conn| {
      conn.execute(
        "UPDATE souls SET moderation = 'removed' WHERE soul_id = ?1",
        params![removed_id],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let page = s.list_souls(&SoulQuery::default()).await.unwrap();
  assert_eq!(page.souls.len(), 1);
  assert_eq!(page.souls[0].slug, "kept");
}

#[tokio::test]
async fn category_filter_applies() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let category = Uuid::new_v4();

  let mut tagged = req("alice", "tagged", actor);
  tagged.category_id = Some(category);
  s.publish(tagged).await.unwrap();
  s.publish(req("alice", "plain", actor)).await.unwrap();

  let page = s
    .list_souls(&SoulQuery { category: Some(category), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.souls.len(), 1);
  assert_eq!(page.souls[0].slug, "tagged");
}

#[tokio::test]
async fn cursor_pagination_walks_without_overlap() {
  let s = store().await;
  let actor = Uuid::new_v4();
  for slug in ["a", "b", "c", "d", "e"] {
    s.publish(req("alice", slug, actor)).await.unwrap();
  }

  let mut seen = Vec::new();
  let mut cursor = None;
  loop {
    let page = s
      .list_souls(&SoulQuery {
        sort: SortKey::Recent,
        limit: Some(2),
        cursor: cursor.clone(),
        ..Default::default()
      })
      .await
      .unwrap();
    seen.extend(page.souls.iter().map(|s| s.soul_id));
    match page.next_cursor {
      Some(next) => cursor = Some(next),
      None => break,
    }
  }

  assert_eq!(seen.len(), 5);
  let mut deduped = seen.clone();
  deduped.sort();
  deduped.dedup();
  assert_eq!(deduped.len(), 5, "pages must not overlap");
}

#[tokio::test]
async fn featured_window_lists_only_featured() {
  let s = store().await;
  let actor = Uuid::new_v4();
  s.publish(req("alice", "plain", actor)).await.unwrap();
  let starred = s.publish(req("alice", "chosen", actor)).await.unwrap();

  let id_str = encode_uuid(starred.soul_id);
  s.raw_call(move |conn| {
      conn.execute(
        "UPDATE souls SET featured = 1 WHERE soul_id = ?1",
        params![id_str],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let featured = s.list_featured(10).await.unwrap();
  assert_eq!(featured.len(), 1);
  assert_eq!(featured[0].slug, "chosen");
}

// ─── Hot ranking ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn hot_orders_by_count_then_delta() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let a = s.publish(req("alice", "a", actor)).await.unwrap();
  let b = s.publish(req("alice", "b", actor)).await.unwrap();
  let c = s.publish(req("alice", "c", actor)).await.unwrap();

  // A: 10 recent / 4 prior (+6); B: 10 / 9 (+1); C: 12 / 20 (−8).
  seed_downloads(&s, a.soul_id, 30, 10).await;
  seed_downloads(&s, a.soul_id, 90, 4).await;
  seed_downloads(&s, b.soul_id, 30, 10).await;
  seed_downloads(&s, b.soul_id, 90, 9).await;
  seed_downloads(&s, c.soul_id, 30, 12).await;
  seed_downloads(&s, c.soul_id, 90, 20).await;

  let page = s
    .list_souls(&SoulQuery { sort: SortKey::Hot, ..Default::default() })
    .await
    .unwrap();

  let ids: Vec<Uuid> = page.souls.iter().map(|s| s.soul_id).collect();
  assert_eq!(ids, vec![c.soul_id, a.soul_id, b.soul_id]);
  assert!(page.next_cursor.is_none(), "hot is a snapshot, not a feed");
}

#[tokio::test]
async fn hot_ignores_events_older_than_two_hours() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let fresh = s.publish(req("alice", "fresh", actor)).await.unwrap();
  let stale = s.publish(req("alice", "stale", actor)).await.unwrap();

  seed_downloads(&s, fresh.soul_id, 10, 1).await;
  seed_downloads(&s, stale.soul_id, 200, 50).await;

  let page = s
    .list_souls(&SoulQuery { sort: SortKey::Hot, ..Default::default() })
    .await
    .unwrap();
  let ids: Vec<Uuid> = page.souls.iter().map(|s| s.soul_id).collect();
  assert_eq!(ids, vec![fresh.soul_id]);
}

#[tokio::test]
async fn hot_excludes_deleted_souls_after_scoring() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let kept = s.publish(req("alice", "kept", actor)).await.unwrap();
  let gone = s.publish(req("alice", "gone", actor)).await.unwrap();

  seed_downloads(&s, kept.soul_id, 30, 2).await;
  seed_downloads(&s, gone.soul_id, 30, 9).await;
  s.soft_delete_soul(gone.soul_id, actor).await.unwrap();

  let page = s
    .list_souls(&SoulQuery { sort: SortKey::Hot, ..Default::default() })
    .await
    .unwrap();
  let ids: Vec<Uuid> = page.souls.iter().map(|s| s.soul_id).collect();
  assert_eq!(ids, vec![kept.soul_id]);
}

// ─── Trending ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn trending_favours_recent_activity() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let hot_now = s.publish(req("alice", "hot-now", actor)).await.unwrap();
  let has_been = s.publish(req("alice", "has-been", actor)).await.unwrap();

  // Equal volume; one soul's activity aged three weeks back.
  for _ in 0..5 {
    s.track_download("alice", "hot-now", None).await.unwrap();
    s.track_download("alice", "has-been", None).await.unwrap();
  }
  let old_id = encode_uuid(has_been.soul_id);
  let old_day = encode_day((Utc::now() - Duration::days(21)).date_naive());
  s.raw_call(move |conn| {
      conn.execute(
        "UPDATE daily_rollups SET day = ?2 WHERE soul_id = ?1",
        params![old_id, old_day],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let scored = s.recompute_trending_scores().await.unwrap();
  assert_eq!(scored, 2);

  let fresh = s.get_soul(hot_now.soul_id).await.unwrap().unwrap();
  let aged = s.get_soul(has_been.soul_id).await.unwrap().unwrap();
  let (fresh_score, aged_score) =
    (fresh.trending_score.unwrap(), aged.trending_score.unwrap());
  assert!(fresh_score > aged_score);
  assert!(aged_score > 0.0);

  let trending = s.list_trending(10).await.unwrap();
  let ids: Vec<Uuid> = trending.iter().map(|s| s.soul_id).collect();
  assert_eq!(ids[0], hot_now.soul_id);
}

#[tokio::test]
async fn trending_recompute_is_idempotent() {
  let s = store().await;
  s.publish(req("alice", "coach", Uuid::new_v4())).await.unwrap();
  s.track_download("alice", "coach", None).await.unwrap();

  s.recompute_trending_scores().await.unwrap();
  let first = s
    .resolve_soul("alice", "coach")
    .await
    .unwrap()
    .unwrap()
    .trending_score;

  s.recompute_trending_scores().await.unwrap();
  let second = s
    .resolve_soul("alice", "coach")
    .await
    .unwrap()
    .unwrap()
    .trending_score;

  assert_eq!(first, second);
}

#[tokio::test]
async fn trending_sort_reads_the_precomputed_field() {
  let s = store().await;
  let actor = Uuid::new_v4();
  let top = s.publish(req("alice", "top", actor)).await.unwrap();
  let mid = s.publish(req("alice", "mid", actor)).await.unwrap();
  s.publish(req("alice", "unscored", actor)).await.unwrap();

  for (id, score) in [(top.soul_id, 9.5_f64), (mid.soul_id, 3.25)] {
    let id_str = encode_uuid(id);
    s.raw_call(move |conn| {
        conn.execute(
          "UPDATE souls SET trending_score = ?2 WHERE soul_id = ?1",
          params![id_str, score],
        )?;
        Ok(())
      })
      .await
      .unwrap();
  }

  let page = s
    .list_souls(&SoulQuery { sort: SortKey::Trending, ..Default::default() })
    .await
    .unwrap();
  let slugs: Vec<&str> =
    page.souls.iter().map(|s| s.slug.as_str()).collect();
  assert_eq!(slugs, vec!["top", "mid", "unscored"]);
}
