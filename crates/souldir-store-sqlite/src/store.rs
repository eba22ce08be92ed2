//! [`SqliteStore`] — the SQLite implementation of [`SoulStore`].
//!
//! Each mutation runs as one explicit transaction inside a single
//! [`tokio_rusqlite::Connection::call`], so a caller observes all of a
//! mutation's effect or none of it. The connection thread serializes
//! concurrent mutations; a second identical-explicit-version publish
//! surfaces `VersionAlreadyExists` rather than being hidden.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use souldir_core::{
  rank::{self, HotEntry, SortKey},
  slug,
  soul::{DailyRollup, ForkOrigin, ModerationStatus, Soul},
  store::{
    DownloadOutcome, PublishOutcome, PublishRequest, SlugAvailability,
    SoulPage, SoulQuery, SoulStore,
  },
  version::{self, ChangelogSource, Version, VersionSummary},
};

use crate::{
  Error, Result,
  encode::{
    Cursor, RawSoul, RawVersion, RawVersionSummary, SOUL_COLUMNS,
    VERSION_COLUMNS, VERSION_SUMMARY_COLUMNS, decode_cursor, decode_day,
    decode_uuid, encode_changelog_source, encode_cursor, encode_day,
    encode_dt, encode_moderation, encode_provenance, encode_string_list,
    encode_uuid, encode_uuid_list,
  },
  schema::SCHEMA,
};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Authenticated repeat downloads inside this window are deduplicated.
const DOWNLOAD_DEDUP_HOURS: i64 = 24;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A souldir store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread, flattening transport and domain
  /// errors into [`enum@Error`].
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  #[cfg(test)]
  pub(crate) async fn raw_call<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T>
      + Send
      + 'static,
    T: Send + 'static,
  {
    Ok(self.conn.call(move |conn| Ok(f(conn)?)).await?)
  }
}

// ─── Counter cache + rollup ledger ───────────────────────────────────────────

/// The counters a mutation can move. Column names are fixed here, never
/// caller-supplied.
#[derive(Debug, Clone, Copy)]
enum Counter {
  Downloads,
  Views,
  Stars,
  Upvotes,
  Comments,
}

impl Counter {
  fn column(self) -> &'static str {
    match self {
      Counter::Downloads => "downloads",
      Counter::Views => "views",
      Counter::Stars => "stars",
      Counter::Upvotes => "upvotes",
      Counter::Comments => "comments",
    }
  }

  /// Only the counters that feed the trending substrate get a same-day
  /// rollup row.
  fn feeds_rollup(self) -> bool {
    matches!(self, Counter::Downloads | Counter::Views | Counter::Stars)
  }
}

/// Apply one counter movement to the embedded cache and, where relevant, the
/// same-day rollup — always inside the caller's open transaction, never one
/// without the other. Decrements clamp at zero.
fn apply_counter(
  conn: &rusqlite::Connection,
  soul_id: &str,
  counter: Counter,
  delta: i64,
  now: DateTime<Utc>,
) -> Result<()> {
  let col = counter.column();

  conn.execute(
    &format!(
      "UPDATE souls SET {col} = MAX({col} + ?2, 0), updated_at = ?3
       WHERE soul_id = ?1"
    ),
    params![soul_id, delta, encode_dt(now)],
  )?;

  if counter.feeds_rollup() {
    conn.execute(
      &format!(
        "INSERT INTO daily_rollups (soul_id, day, {col})
         VALUES (?1, ?2, MAX(?3, 0))
         ON CONFLICT(soul_id, day) DO UPDATE SET {col} = MAX({col} + ?3, 0)"
      ),
      params![soul_id, encode_day(now.date_naive()), delta],
    )?;
  }

  Ok(())
}

// ─── Row loading helpers ─────────────────────────────────────────────────────

fn load_soul_by_pair(
  conn: &rusqlite::Connection,
  namespace: &str,
  slug: &str,
) -> Result<Option<Soul>> {
  conn
    .query_row(
      &format!(
        "SELECT {SOUL_COLUMNS} FROM souls
         WHERE owner_namespace = ?1 AND slug = ?2 AND deleted_at IS NULL"
      ),
      params![namespace, slug],
      RawSoul::from_row,
    )
    .optional()?
    .map(RawSoul::into_soul)
    .transpose()
}

fn load_soul_by_id(
  conn: &rusqlite::Connection,
  soul_id: Uuid,
) -> Result<Option<Soul>> {
  conn
    .query_row(
      &format!("SELECT {SOUL_COLUMNS} FROM souls WHERE soul_id = ?1"),
      params![encode_uuid(soul_id)],
      RawSoul::from_row,
    )
    .optional()?
    .map(RawSoul::into_soul)
    .transpose()
}

/// Load a soul that must exist and not be soft-deleted, for owner-gated
/// mutations.
fn require_live_soul(
  conn: &rusqlite::Connection,
  soul_id: Uuid,
) -> Result<Soul> {
  match load_soul_by_id(conn, soul_id)? {
    Some(soul) if soul.is_live() => Ok(soul),
    _ => Err(souldir_core::Error::SoulNotFound(soul_id).into()),
  }
}

// ─── Publish ─────────────────────────────────────────────────────────────────

fn publish_tx(
  conn: &mut rusqlite::Connection,
  req: PublishRequest,
) -> Result<PublishOutcome> {
  let namespace = slug::normalized(&req.owner_namespace)?;
  let slug = slug::normalized(&req.slug)?;

  let tx = conn.transaction()?;
  let now = Utc::now();
  let now_str = encode_dt(now);

  // Resolve the publish target. The check-then-create below is atomic with
  // the insert: both happen inside this transaction, and the partial unique
  // index on (owner_namespace, slug) backs it.
  let existing: Option<(String, String)> = tx
    .query_row(
      "SELECT soul_id, owner_id FROM souls
       WHERE owner_namespace = ?1 AND slug = ?2 AND deleted_at IS NULL",
      params![namespace, slug],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;

  let (soul_id_str, is_new_soul) = match existing {
    Some((soul_id, owner_id)) => {
      if decode_uuid(&owner_id)? != req.actor {
        return Err(
          souldir_core::Error::NamespaceConflict { namespace, slug }.into(),
        );
      }
      (soul_id, false)
    }
    None => {
      let soul_id = encode_uuid(Uuid::new_v4());
      tx.execute(
        "INSERT INTO souls (
           soul_id, owner_namespace, owner_id, slug, name, tagline,
           description, category_id, tag_ids, tested_with, forked_from,
           moderation, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
          soul_id,
          namespace,
          encode_uuid(req.actor),
          slug,
          req.name,
          req.tagline,
          req.description,
          req.category_id.map(encode_uuid),
          encode_uuid_list(&req.tag_ids)?,
          encode_string_list(&req.tested_with)?,
          req.forked_from.map(encode_uuid),
          encode_moderation(ModerationStatus::Active),
          now_str,
          now_str,
        ],
      )?;
      (soul_id, true)
    }
  };

  // The base for implicit bumps: the highest-sequence version, soft-deleted
  // included. Numbering only moves forward; a deleted version's string is
  // never reissued (semver stays unique over all rows of a soul).
  let latest_semver: Option<String> = tx
    .query_row(
      "SELECT semver FROM versions
       WHERE soul_id = ?1
       ORDER BY sequence DESC LIMIT 1",
      params![soul_id_str],
      |row| row.get(0),
    )
    .optional()?;

  let resolved_version = match &req.explicit_version {
    Some(raw) => {
      let canonical = version::parse(raw)?.to_string();
      let taken: bool = tx
        .query_row(
          "SELECT 1 FROM versions WHERE soul_id = ?1 AND semver = ?2",
          params![soul_id_str, canonical],
          |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
      if taken {
        return Err(
          souldir_core::Error::VersionAlreadyExists {
            soul_id: decode_uuid(&soul_id_str)?,
            version: canonical,
          }
          .into(),
        );
      }
      canonical
    }
    None => version::next_version(latest_semver.as_deref(), req.bump)?,
  };

  // Sequence numbers run over all versions, soft-deleted included, so the
  // ledger stays gapless.
  let sequence: i64 = tx.query_row(
    "SELECT COALESCE(MAX(sequence), 0) + 1 FROM versions WHERE soul_id = ?1",
    params![soul_id_str],
    |row| row.get(0),
  )?;

  let (changelog, changelog_source) = match req.changelog {
    Some(text) if !text.trim().is_empty() => (text, ChangelogSource::User),
    _ => (
      version::default_changelog(sequence == 1).to_owned(),
      ChangelogSource::Auto,
    ),
  };

  let fingerprint = req
    .fingerprint
    .unwrap_or_else(|| version::fingerprint(&req.content));

  let version_id = Uuid::new_v4();
  tx.execute(
    "INSERT INTO versions (
       version_id, soul_id, semver, sequence, content, fingerprint,
       changelog, changelog_source, provenance, created_by, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    params![
      encode_uuid(version_id),
      soul_id_str,
      resolved_version,
      sequence,
      req.content,
      fingerprint,
      changelog,
      encode_changelog_source(changelog_source),
      encode_provenance(&req.provenance)?,
      encode_uuid(req.actor),
      now_str,
    ],
  )?;

  // Metadata refresh, latest pointer, and version counter move with the
  // insert above; there is no committed state where the pointer references
  // a version that does not exist or an appended version is uncounted.
  tx.execute(
    "UPDATE souls SET
       name = ?2, tagline = ?3, description = ?4, category_id = ?5,
       tag_ids = ?6, tested_with = ?7, latest_version_id = ?8,
       versions = versions + 1, updated_at = ?9
     WHERE soul_id = ?1",
    params![
      soul_id_str,
      req.name,
      req.tagline,
      req.description,
      req.category_id.map(encode_uuid),
      encode_uuid_list(&req.tag_ids)?,
      encode_string_list(&req.tested_with)?,
      encode_uuid(version_id),
      now_str,
    ],
  )?;

  tx.commit()?;

  Ok(PublishOutcome {
    soul_id: decode_uuid(&soul_id_str)?,
    version_id,
    resolved_version,
    is_new_soul,
  })
}

// ─── Soft delete ─────────────────────────────────────────────────────────────

fn soft_delete_soul_tx(
  conn: &mut rusqlite::Connection,
  soul_id: Uuid,
  actor: Uuid,
) -> Result<()> {
  let tx = conn.transaction()?;
  let soul = require_live_soul(&tx, soul_id)?;
  if soul.owner_id != actor {
    return Err(souldir_core::Error::PermissionDenied(actor).into());
  }

  let now_str = encode_dt(Utc::now());
  let id_str = encode_uuid(soul_id);

  // Cascade in the same unit of work; history is preserved for undelete.
  tx.execute(
    "UPDATE souls SET deleted_at = ?2, updated_at = ?2, versions = 0
     WHERE soul_id = ?1",
    params![id_str, now_str],
  )?;
  tx.execute(
    "UPDATE versions SET deleted_at = ?2
     WHERE soul_id = ?1 AND deleted_at IS NULL",
    params![id_str, now_str],
  )?;

  tx.commit()?;
  Ok(())
}

fn soft_delete_version_tx(
  conn: &mut rusqlite::Connection,
  soul_id: Uuid,
  semver: String,
  actor: Uuid,
) -> Result<()> {
  let tx = conn.transaction()?;
  let soul = require_live_soul(&tx, soul_id)?;
  if soul.owner_id != actor {
    return Err(souldir_core::Error::PermissionDenied(actor).into());
  }

  let id_str = encode_uuid(soul_id);
  let target: Option<(String, Option<String>)> = tx
    .query_row(
      "SELECT version_id, deleted_at FROM versions
       WHERE soul_id = ?1 AND semver = ?2",
      params![id_str, semver],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;

  let version_id = match target {
    Some((version_id, None)) => version_id,
    _ => {
      return Err(
        souldir_core::Error::VersionNotFound { soul_id, version: semver }
          .into(),
      );
    }
  };

  let now_str = encode_dt(Utc::now());
  tx.execute(
    "UPDATE versions SET deleted_at = ?2 WHERE version_id = ?1",
    params![version_id, now_str],
  )?;

  // The versions stat always equals the non-deleted count; this is the one
  // counter recomputed from scratch rather than adjusted.
  let remaining: i64 = tx.query_row(
    "SELECT COUNT(*) FROM versions WHERE soul_id = ?1 AND deleted_at IS NULL",
    params![id_str],
    |row| row.get(0),
  )?;
  let new_latest: Option<String> = tx
    .query_row(
      "SELECT version_id FROM versions
       WHERE soul_id = ?1 AND deleted_at IS NULL
       ORDER BY sequence DESC LIMIT 1",
      params![id_str],
      |row| row.get(0),
    )
    .optional()?;

  tx.execute(
    "UPDATE souls SET versions = ?2, latest_version_id = ?3, updated_at = ?4
     WHERE soul_id = ?1",
    params![id_str, remaining, new_latest, now_str],
  )?;

  tx.commit()?;
  Ok(())
}

// ─── Activity ────────────────────────────────────────────────────────────────

fn track_download_tx(
  conn: &mut rusqlite::Connection,
  namespace: String,
  slug: String,
  actor: Option<Uuid>,
) -> Result<DownloadOutcome> {
  let tx = conn.transaction()?;
  let now = Utc::now();

  let soul_id: Option<String> = tx
    .query_row(
      "SELECT soul_id FROM souls
       WHERE owner_namespace = ?1 AND slug = ?2 AND deleted_at IS NULL",
      params![namespace, slug],
      |row| row.get(0),
    )
    .optional()?;
  let Some(soul_id) = soul_id else {
    // Fire-and-forget beacon against a missing soul; nothing to count.
    return Ok(DownloadOutcome { success: false, deduplicated: false });
  };

  if let Some(actor) = actor {
    let window_start =
      encode_dt(now - Duration::hours(DOWNLOAD_DEDUP_HOURS));
    let already: bool = tx
      .query_row(
        "SELECT 1 FROM download_events
         WHERE soul_id = ?1 AND actor_id = ?2 AND created_at >= ?3
         LIMIT 1",
        params![soul_id, encode_uuid(actor), window_start],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false);
    if already {
      // Already counted within the window: no ledger row, no counter move.
      return Ok(DownloadOutcome { success: true, deduplicated: true });
    }
  }

  tx.execute(
    "INSERT INTO download_events (event_id, soul_id, actor_id, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![
      encode_uuid(Uuid::new_v4()),
      soul_id,
      actor.map(encode_uuid),
      encode_dt(now),
    ],
  )?;
  apply_counter(&tx, &soul_id, Counter::Downloads, 1, now)?;

  tx.commit()?;
  Ok(DownloadOutcome { success: true, deduplicated: false })
}

fn track_view_tx(
  conn: &mut rusqlite::Connection,
  namespace: String,
  slug: String,
) -> Result<()> {
  let tx = conn.transaction()?;
  let now = Utc::now();

  let soul_id: Option<String> = tx
    .query_row(
      "SELECT soul_id FROM souls
       WHERE owner_namespace = ?1 AND slug = ?2 AND deleted_at IS NULL",
      params![namespace, slug],
      |row| row.get(0),
    )
    .optional()?;
  let Some(soul_id) = soul_id else { return Ok(()) };

  apply_counter(&tx, &soul_id, Counter::Views, 1, now)?;
  tx.commit()?;
  Ok(())
}

/// Shared star/upvote toggle. `table` is fixed by the caller, never user
/// input. Returns the new membership state.
fn toggle_membership_tx(
  conn: &mut rusqlite::Connection,
  table: &'static str,
  counter: Counter,
  soul_id: Uuid,
  actor: Uuid,
) -> Result<bool> {
  let tx = conn.transaction()?;
  require_live_soul(&tx, soul_id)?;

  let now = Utc::now();
  let id_str = encode_uuid(soul_id);
  let actor_str = encode_uuid(actor);

  let member: bool = tx
    .query_row(
      &format!("SELECT 1 FROM {table} WHERE soul_id = ?1 AND actor_id = ?2"),
      params![id_str, actor_str],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false);

  if member {
    tx.execute(
      &format!("DELETE FROM {table} WHERE soul_id = ?1 AND actor_id = ?2"),
      params![id_str, actor_str],
    )?;
    apply_counter(&tx, &id_str, counter, -1, now)?;
  } else {
    tx.execute(
      &format!(
        "INSERT INTO {table} (soul_id, actor_id, created_at)
         VALUES (?1, ?2, ?3)"
      ),
      params![id_str, actor_str, encode_dt(now)],
    )?;
    apply_counter(&tx, &id_str, counter, 1, now)?;
  }

  tx.commit()?;
  Ok(!member)
}

fn adjust_comments_tx(
  conn: &mut rusqlite::Connection,
  soul_id: Uuid,
  delta: i64,
) -> Result<()> {
  let tx = conn.transaction()?;
  require_live_soul(&tx, soul_id)?;
  apply_counter(&tx, &encode_uuid(soul_id), Counter::Comments, delta, Utc::now())?;
  tx.commit()?;
  Ok(())
}

// ─── Slug availability ───────────────────────────────────────────────────────

fn check_slug_tx(
  conn: &rusqlite::Connection,
  namespace: &str,
  slug: &str,
  actor: Option<Uuid>,
) -> Result<SlugAvailability> {
  let row: Option<(String, i64)> = conn
    .query_row(
      "SELECT owner_id, versions FROM souls
       WHERE owner_namespace = ?1 AND slug = ?2 AND deleted_at IS NULL",
      params![namespace, slug],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;

  Ok(match row {
    Some((owner_id, versions)) => {
      let is_owner_already = actor == Some(decode_uuid(&owner_id)?);
      SlugAvailability {
        available: false,
        is_owner_already,
        current_version_count: Some(versions.max(0) as u64),
      }
    }
    None => SlugAvailability {
      available:             true,
      is_owner_already:      false,
      current_version_count: None,
    },
  })
}

// ─── Version history ─────────────────────────────────────────────────────────

fn list_versions_tx(
  conn: &rusqlite::Connection,
  soul_id: Uuid,
) -> Result<Vec<VersionSummary>> {
  require_live_soul(conn, soul_id)?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {VERSION_SUMMARY_COLUMNS} FROM versions
     WHERE soul_id = ?1 AND deleted_at IS NULL
     ORDER BY sequence DESC"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(soul_id)], RawVersionSummary::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawVersionSummary::into_summary).collect()
}

fn get_version_tx(
  conn: &rusqlite::Connection,
  soul_id: Uuid,
  semver: &str,
) -> Result<Option<Version>> {
  // Canonicalize when parseable so `1.0.0+build` style lookups behave like
  // publish did; an unparseable string simply misses.
  let lookup = version::parse(semver)
    .map(|v| v.to_string())
    .unwrap_or_else(|_| semver.to_owned());

  conn
    .query_row(
      &format!(
        "SELECT {VERSION_COLUMNS} FROM versions
         WHERE soul_id = ?1 AND semver = ?2 AND deleted_at IS NULL"
      ),
      params![encode_uuid(soul_id), lookup],
      RawVersion::from_row,
    )
    .optional()?
    .map(RawVersion::into_version)
    .transpose()
}

// ─── Fork lineage ────────────────────────────────────────────────────────────

fn fork_origin_tx(
  conn: &rusqlite::Connection,
  soul_id: Uuid,
) -> Result<ForkOrigin> {
  let soul = load_soul_by_id(conn, soul_id)?
    .ok_or(souldir_core::Error::SoulNotFound(soul_id))?;

  let Some(upstream_id) = soul.forked_from else {
    return Ok(ForkOrigin::None);
  };

  // Lineage is best-effort: a vanished or soft-deleted upstream degrades,
  // never errors.
  Ok(match load_soul_by_id(conn, upstream_id)? {
    Some(upstream) if upstream.is_live() => ForkOrigin::Available {
      soul_id:         upstream.soul_id,
      name:            upstream.name,
      owner_namespace: upstream.owner_namespace,
      slug:            upstream.slug,
    },
    _ => ForkOrigin::Unavailable,
  })
}

// ─── Listings ────────────────────────────────────────────────────────────────

/// SQL sort-key expressions per strategy; every key orders DESC with
/// `soul_id DESC` as the final tiebreak.
fn sort_key_exprs(sort: SortKey) -> &'static [&'static str] {
  match sort {
    SortKey::Recent => &["updated_at"],
    SortKey::Published => &["created_at"],
    SortKey::Popular => &["downloads"],
    SortKey::Stars => &["stars"],
    SortKey::Trending => &["COALESCE(trending_score, -1.0)", "updated_at"],
    SortKey::Hot => &[],
  }
}

/// The raw column values a cursor carries for the last row of a page.
fn cursor_keys(sort: SortKey, raw: &RawSoul) -> Vec<serde_json::Value> {
  match sort {
    SortKey::Recent => vec![raw.updated_at.clone().into()],
    SortKey::Published => vec![raw.created_at.clone().into()],
    SortKey::Popular => vec![raw.downloads.into()],
    SortKey::Stars => vec![raw.stars.into()],
    SortKey::Trending => vec![
      raw.trending_score.unwrap_or(-1.0).into(),
      raw.updated_at.clone().into(),
    ],
    SortKey::Hot => vec![],
  }
}

fn json_to_sql(value: &serde_json::Value) -> Result<rusqlite::types::Value> {
  use rusqlite::types::Value;
  match value {
    serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
    serde_json::Value::Number(n) if n.is_i64() => {
      Ok(Value::Integer(n.as_i64().unwrap_or_default()))
    }
    serde_json::Value::Number(n) => {
      Ok(Value::Real(n.as_f64().unwrap_or_default()))
    }
    other => Err(
      souldir_core::Error::InvalidIdentifier(other.to_string()).into(),
    ),
  }
}

fn push_filters(
  query: &SoulQuery,
  conds: &mut Vec<String>,
  binds: &mut Vec<rusqlite::types::Value>,
) -> Result<()> {
  use rusqlite::types::Value;
  if let Some(category) = query.category {
    conds.push("category_id = ?".to_owned());
    binds.push(Value::Text(encode_uuid(category)));
  }
  if let Some(tag) = query.tag {
    // Tag ids are stored as a JSON array of quoted UUIDs; a quoted LIKE
    // match is collision-safe. FTS-style filtering is a later phase.
    conds.push("tag_ids LIKE ?".to_owned());
    binds.push(Value::Text(format!("%\"{}\"%", encode_uuid(tag))));
  }
  if let Some(tested) = &query.tested_with {
    conds.push("tested_with LIKE ?".to_owned());
    binds.push(Value::Text(format!("%{}%", serde_json::to_string(tested)?)));
  }
  Ok(())
}

fn page_limit(requested: Option<usize>) -> usize {
  requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn list_indexed_tx(
  conn: &rusqlite::Connection,
  query: &SoulQuery,
) -> Result<SoulPage> {
  use rusqlite::types::Value;

  let limit = page_limit(query.limit);
  let key_exprs = sort_key_exprs(query.sort);

  let mut conds =
    vec!["deleted_at IS NULL".to_owned(), "moderation != 'removed'".to_owned()];
  let mut binds: Vec<Value> = Vec::new();
  push_filters(query, &mut conds, &mut binds)?;

  if let Some(raw_cursor) = &query.cursor {
    let cursor = decode_cursor(raw_cursor)?;
    if cursor.keys.len() != key_exprs.len() {
      return Err(
        souldir_core::Error::InvalidIdentifier(raw_cursor.clone()).into(),
      );
    }
    let lhs = format!("({}, soul_id)", key_exprs.join(", "));
    let placeholders = vec!["?"; key_exprs.len() + 1].join(", ");
    conds.push(format!("{lhs} < ({placeholders})"));
    for key in &cursor.keys {
      binds.push(json_to_sql(key)?);
    }
    binds.push(Value::Text(cursor.id));
  }

  let order_by = key_exprs
    .iter()
    .map(|k| format!("{k} DESC"))
    .chain(std::iter::once("soul_id DESC".to_owned()))
    .collect::<Vec<_>>()
    .join(", ");

  let sql = format!(
    "SELECT {SOUL_COLUMNS} FROM souls
     WHERE {}
     ORDER BY {order_by}
     LIMIT ?",
    conds.join(" AND ")
  );
  binds.push(Value::Integer(limit as i64));

  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params_from_iter(binds), RawSoul::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let next_cursor = match raws.last() {
    Some(last) if raws.len() == limit => Some(encode_cursor(&Cursor {
      keys: cursor_keys(query.sort, last),
      id:   last.soul_id.clone(),
    })?),
    _ => None,
  };

  let souls = raws
    .into_iter()
    .map(RawSoul::into_soul)
    .collect::<Result<Vec<_>>>()?;

  Ok(SoulPage { souls, next_cursor })
}

fn matches_filters(soul: &Soul, query: &SoulQuery) -> bool {
  if let Some(category) = query.category
    && soul.category_id != Some(category)
  {
    return false;
  }
  if let Some(tag) = query.tag
    && !soul.tag_ids.contains(&tag)
  {
    return false;
  }
  if let Some(tested) = &query.tested_with
    && !soul.tested_with.iter().any(|t| t == tested)
  {
    return false;
  }
  true
}

/// Hot is a full recomputation per request: bucket the trailing two hours of
/// download events, rank by volume then acceleration, then hydrate. No
/// cursor — the ranking is a snapshot, not a paginated feed.
fn list_hot_tx(
  conn: &rusqlite::Connection,
  query: &SoulQuery,
  now: DateTime<Utc>,
) -> Result<SoulPage> {
  let limit = page_limit(query.limit);
  let window_start = encode_dt(now - Duration::hours(2));
  let bucket_split = encode_dt(now - Duration::hours(1));

  let mut stmt = conn.prepare(
    "SELECT soul_id,
            SUM(CASE WHEN created_at >= ?2 THEN 1 ELSE 0 END) AS recent,
            SUM(CASE WHEN created_at <  ?2 THEN 1 ELSE 0 END) AS previous
     FROM download_events
     WHERE created_at >= ?1
     GROUP BY soul_id",
  )?;
  let rows = stmt
    .query_map(params![window_start, bucket_split], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, i64>(1)?,
        row.get::<_, i64>(2)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut entries = Vec::with_capacity(rows.len());
  for (id_str, recent, previous) in rows {
    entries.push(HotEntry {
      soul_id: decode_uuid(&id_str)?,
      count:   recent.max(0) as u64,
      delta:   recent - previous,
    });
  }
  rank::rank_hot(&mut entries);

  // Scores first, filters second, truncation last, so the returned count
  // reflects post-filter availability.
  let mut souls = Vec::new();
  for entry in entries {
    if souls.len() == limit {
      break;
    }
    let Some(soul) = load_soul_by_id(conn, entry.soul_id)? else { continue };
    if !soul.is_live() || soul.moderation == ModerationStatus::Removed {
      continue;
    }
    if !matches_filters(&soul, query) {
      continue;
    }
    souls.push(soul);
  }

  Ok(SoulPage { souls, next_cursor: None })
}

fn list_window_tx(
  conn: &rusqlite::Connection,
  extra_cond: &str,
  order_by: &str,
  limit: usize,
) -> Result<Vec<Soul>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SOUL_COLUMNS} FROM souls
     WHERE deleted_at IS NULL AND moderation != 'removed' {extra_cond}
     ORDER BY {order_by}
     LIMIT ?1"
  ))?;
  let raws = stmt
    .query_map(params![limit as i64], RawSoul::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSoul::into_soul).collect()
}

// ─── Trending recompute ──────────────────────────────────────────────────────

type ScoreFailures = Vec<(String, String)>;

fn recompute_trending_tx(
  conn: &rusqlite::Connection,
) -> Result<(usize, ScoreFailures)> {
  let today = Utc::now().date_naive();
  let cutoff =
    encode_day(today - Duration::days(rank::TRENDING_WINDOW_DAYS));

  let ids: Vec<String> = {
    let mut stmt =
      conn.prepare("SELECT soul_id FROM souls WHERE deleted_at IS NULL")?;
    let rows = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows
  };

  let mut scored = 0;
  let mut failures: ScoreFailures = Vec::new();

  for id_str in ids {
    // One soul's bad data must not abort the batch for the rest.
    let result = score_one(conn, &id_str, &cutoff, today);
    match result {
      Ok(score) => {
        conn.execute(
          "UPDATE souls SET trending_score = ?2 WHERE soul_id = ?1",
          params![id_str, score],
        )?;
        scored += 1;
      }
      Err(e) => failures.push((id_str, e.to_string())),
    }
  }

  Ok((scored, failures))
}

fn score_one(
  conn: &rusqlite::Connection,
  soul_id: &str,
  cutoff: &str,
  today: chrono::NaiveDate,
) -> Result<f64> {
  let mut stmt = conn.prepare(
    "SELECT day, downloads, views, stars FROM daily_rollups
     WHERE soul_id = ?1 AND day >= ?2",
  )?;
  let rows = stmt
    .query_map(params![soul_id, cutoff], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, i64>(1)?,
        row.get::<_, i64>(2)?,
        row.get::<_, i64>(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let id = decode_uuid(soul_id)?;
  let mut rollups = Vec::with_capacity(rows.len());
  for (day, downloads, views, stars) in rows {
    rollups.push(DailyRollup {
      soul_id:   id,
      day:       decode_day(&day)?,
      downloads: downloads.max(0) as u64,
      views:     views.max(0) as u64,
      stars:     stars.max(0) as u64,
    });
  }

  Ok(rank::trending_score(&rollups, today))
}

// ─── SoulStore impl ──────────────────────────────────────────────────────────

impl SoulStore for SqliteStore {
  type Error = Error;

  // ── Resolution ────────────────────────────────────────────────────────────

  async fn resolve_soul(
    &self,
    owner_namespace: &str,
    slug: &str,
  ) -> Result<Option<Soul>> {
    let namespace = slug::normalize(owner_namespace);
    let slug = slug::normalize(slug);
    self
      .with_conn(move |conn| load_soul_by_pair(conn, &namespace, &slug))
      .await
  }

  async fn get_soul(&self, soul_id: Uuid) -> Result<Option<Soul>> {
    self.with_conn(move |conn| load_soul_by_id(conn, soul_id)).await
  }

  async fn check_slug(
    &self,
    owner_namespace: &str,
    slug: &str,
    actor: Option<Uuid>,
  ) -> Result<SlugAvailability> {
    let namespace = slug::normalized(owner_namespace)?;
    let slug = slug::normalized(slug)?;
    self
      .with_conn(move |conn| check_slug_tx(conn, &namespace, &slug, actor))
      .await
  }

  // ── Publishing ────────────────────────────────────────────────────────────

  async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome> {
    self.with_conn(move |conn| publish_tx(conn, request)).await
  }

  async fn soft_delete_soul(&self, soul_id: Uuid, actor: Uuid) -> Result<()> {
    self
      .with_conn(move |conn| soft_delete_soul_tx(conn, soul_id, actor))
      .await
  }

  async fn soft_delete_version(
    &self,
    soul_id: Uuid,
    version: &str,
    actor: Uuid,
  ) -> Result<()> {
    let semver = version.to_owned();
    self
      .with_conn(move |conn| {
        soft_delete_version_tx(conn, soul_id, semver, actor)
      })
      .await
  }

  // ── Version history ───────────────────────────────────────────────────────

  async fn list_versions(&self, soul_id: Uuid) -> Result<Vec<VersionSummary>> {
    self.with_conn(move |conn| list_versions_tx(conn, soul_id)).await
  }

  async fn get_version(
    &self,
    soul_id: Uuid,
    version: &str,
  ) -> Result<Option<Version>> {
    let semver = version.to_owned();
    self
      .with_conn(move |conn| get_version_tx(conn, soul_id, &semver))
      .await
  }

  // ── Fork lineage ──────────────────────────────────────────────────────────

  async fn resolve_fork_origin(&self, soul_id: Uuid) -> Result<ForkOrigin> {
    self.with_conn(move |conn| fork_origin_tx(conn, soul_id)).await
  }

  // ── Listings ──────────────────────────────────────────────────────────────

  async fn list_souls(&self, query: &SoulQuery) -> Result<SoulPage> {
    let query = query.clone();
    self
      .with_conn(move |conn| match query.sort {
        SortKey::Hot => list_hot_tx(conn, &query, Utc::now()),
        _ => list_indexed_tx(conn, &query),
      })
      .await
  }

  async fn list_featured(&self, limit: usize) -> Result<Vec<Soul>> {
    let limit = page_limit(Some(limit));
    self
      .with_conn(move |conn| {
        list_window_tx(conn, "AND featured = 1", "updated_at DESC", limit)
      })
      .await
  }

  async fn list_trending(&self, limit: usize) -> Result<Vec<Soul>> {
    let limit = page_limit(Some(limit));
    self
      .with_conn(move |conn| {
        list_window_tx(
          conn,
          "",
          "COALESCE(trending_score, -1.0) DESC, updated_at DESC",
          limit,
        )
      })
      .await
  }

  // ── Activity ──────────────────────────────────────────────────────────────

  async fn track_download(
    &self,
    owner_namespace: &str,
    slug: &str,
    actor: Option<Uuid>,
  ) -> Result<DownloadOutcome> {
    let namespace = slug::normalize(owner_namespace);
    let slug = slug::normalize(slug);
    self
      .with_conn(move |conn| track_download_tx(conn, namespace, slug, actor))
      .await
  }

  async fn track_view(&self, owner_namespace: &str, slug: &str) -> Result<()> {
    let namespace = slug::normalize(owner_namespace);
    let slug = slug::normalize(slug);
    self
      .with_conn(move |conn| track_view_tx(conn, namespace, slug))
      .await
  }

  async fn toggle_star(&self, soul_id: Uuid, actor: Uuid) -> Result<bool> {
    self
      .with_conn(move |conn| {
        toggle_membership_tx(conn, "stars", Counter::Stars, soul_id, actor)
      })
      .await
  }

  async fn toggle_upvote(&self, soul_id: Uuid, actor: Uuid) -> Result<bool> {
    self
      .with_conn(move |conn| {
        toggle_membership_tx(conn, "upvotes", Counter::Upvotes, soul_id, actor)
      })
      .await
  }

  async fn adjust_comments(&self, soul_id: Uuid, delta: i64) -> Result<()> {
    self
      .with_conn(move |conn| adjust_comments_tx(conn, soul_id, delta))
      .await
  }

  // ── Scheduled scoring ─────────────────────────────────────────────────────

  async fn recompute_trending_scores(&self) -> Result<usize> {
    let (scored, failures) =
      self.with_conn(|conn| recompute_trending_tx(conn)).await?;
    for (soul_id, error) in failures {
      tracing::warn!(%soul_id, %error, "skipped soul during trending recompute");
    }
    Ok(scored)
  }
}
