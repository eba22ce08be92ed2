//! SQL schema for the souldir SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS souls (
    soul_id           TEXT PRIMARY KEY,
    owner_namespace   TEXT NOT NULL,
    owner_id          TEXT NOT NULL,
    slug              TEXT NOT NULL,
    name              TEXT NOT NULL,
    tagline           TEXT NOT NULL DEFAULT '',
    description       TEXT,
    category_id       TEXT,
    tag_ids           TEXT NOT NULL DEFAULT '[]',  -- JSON array of UUIDs
    tested_with       TEXT NOT NULL DEFAULT '[]',  -- JSON array of model names
    latest_version_id TEXT,
    forked_from       TEXT,            -- lineage only; not an enforced FK
    downloads         INTEGER NOT NULL DEFAULT 0,
    stars             INTEGER NOT NULL DEFAULT 0,
    upvotes           INTEGER NOT NULL DEFAULT 0,
    versions          INTEGER NOT NULL DEFAULT 0,
    comments          INTEGER NOT NULL DEFAULT 0,
    views             INTEGER NOT NULL DEFAULT 0,
    featured          INTEGER NOT NULL DEFAULT 0,
    trending_score    REAL,
    moderation        TEXT NOT NULL DEFAULT 'active', -- 'active' | 'flagged' | 'removed'
    deleted_at        TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

-- The check-then-create in publish() runs inside one transaction; this
-- partial index backs it against concurrent first-publishes.
CREATE UNIQUE INDEX IF NOT EXISTS souls_namespace_slug_live_idx
    ON souls(owner_namespace, slug) WHERE deleted_at IS NULL;

CREATE INDEX IF NOT EXISTS souls_category_idx  ON souls(category_id);
CREATE INDEX IF NOT EXISTS souls_updated_idx   ON souls(updated_at);
CREATE INDEX IF NOT EXISTS souls_created_idx   ON souls(created_at);
CREATE INDEX IF NOT EXISTS souls_downloads_idx ON souls(downloads);
CREATE INDEX IF NOT EXISTS souls_stars_idx     ON souls(stars);
CREATE INDEX IF NOT EXISTS souls_trending_idx  ON souls(trending_score);

-- Version content is immutable once written; only deleted_at is ever
-- updated, by the soft-delete cascade.
CREATE TABLE IF NOT EXISTS versions (
    version_id       TEXT PRIMARY KEY,
    soul_id          TEXT NOT NULL REFERENCES souls(soul_id),
    semver           TEXT NOT NULL,
    sequence         INTEGER NOT NULL,
    content          TEXT NOT NULL,
    fingerprint      TEXT NOT NULL,   -- SHA-256 hex of content
    changelog        TEXT NOT NULL,
    changelog_source TEXT NOT NULL DEFAULT 'auto',  -- 'auto' | 'user'
    provenance       TEXT NOT NULL DEFAULT '{\"kind\":\"upload\"}',
    created_by       TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    deleted_at       TEXT,
    UNIQUE (soul_id, sequence),
    UNIQUE (soul_id, semver)
);

CREATE INDEX IF NOT EXISTS versions_soul_idx ON versions(soul_id);

-- One row per (soul, calendar day); created lazily on the first event of the
-- day. The substrate for trending scores.
CREATE TABLE IF NOT EXISTS daily_rollups (
    soul_id   TEXT NOT NULL REFERENCES souls(soul_id),
    day       TEXT NOT NULL,           -- YYYY-MM-DD (UTC)
    downloads INTEGER NOT NULL DEFAULT 0,
    views     INTEGER NOT NULL DEFAULT 0,
    stars     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (soul_id, day)
);

-- Download events are strictly append-only; the embedded counters are a
-- cache over this ledger, rebuildable if they ever drift.
CREATE TABLE IF NOT EXISTS download_events (
    event_id   TEXT PRIMARY KEY,
    soul_id    TEXT NOT NULL REFERENCES souls(soul_id),
    actor_id   TEXT,                   -- NULL for anonymous downloads
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS download_events_soul_time_idx
    ON download_events(soul_id, created_at);
CREATE INDEX IF NOT EXISTS download_events_actor_idx
    ON download_events(soul_id, actor_id, created_at);

CREATE TABLE IF NOT EXISTS stars (
    soul_id    TEXT NOT NULL REFERENCES souls(soul_id),
    actor_id   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (soul_id, actor_id)
);

CREATE TABLE IF NOT EXISTS upvotes (
    soul_id    TEXT NOT NULL REFERENCES souls(soul_id),
    actor_id   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (soul_id, actor_id)
);

PRAGMA user_version = 1;
";
