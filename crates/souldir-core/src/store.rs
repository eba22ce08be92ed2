//! The `SoulStore` trait and supporting request/response types.
//!
//! The trait is implemented by storage backends (e.g.
//! `souldir-store-sqlite`). Higher layers (`souldir-api`, `souldir-server`)
//! depend on this abstraction, not on any concrete backend.
//!
//! Every mutation is atomic: a caller observes all of its effect or none.
//! Failures are terminal and synchronous — nothing retries inside the store;
//! retry after a racing `VersionAlreadyExists` is the caller's decision.

use std::future::Future;

use uuid::Uuid;

use crate::{
  rank::SortKey,
  soul::{ForkOrigin, Soul},
  version::{BumpKind, Provenance, Version, VersionSummary},
};

// ─── Publish types ───────────────────────────────────────────────────────────

/// Input to [`SoulStore::publish`].
///
/// `owner_namespace` and `slug` are normalized (trimmed, lowercased) and
/// validated by the store; `actor` is the authenticated account publishing,
/// which becomes the owner on first publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
  pub owner_namespace:  String,
  pub slug:             String,
  pub actor:            Uuid,
  pub name:             String,
  pub tagline:          String,
  pub description:      Option<String>,
  pub category_id:      Option<Uuid>,
  pub tag_ids:          Vec<Uuid>,
  pub tested_with:      Vec<String>,
  pub content:          String,
  /// SHA-256 hex of `content`; computed by the store when absent.
  pub fingerprint:      Option<String>,
  /// Exact version to assign. Mutually authoritative over `bump`: when set,
  /// `bump` is ignored.
  pub explicit_version: Option<String>,
  pub bump:             BumpKind,
  pub changelog:        Option<String>,
  pub provenance:       Provenance,
  /// Fork lineage, recorded verbatim on first publish only.
  pub forked_from:      Option<Uuid>,
}

impl PublishRequest {
  /// Convenience constructor with all optional fields at their defaults.
  pub fn new(
    owner_namespace: impl Into<String>,
    slug: impl Into<String>,
    actor: Uuid,
    name: impl Into<String>,
    content: impl Into<String>,
  ) -> Self {
    Self {
      owner_namespace:  owner_namespace.into(),
      slug:             slug.into(),
      actor,
      name:             name.into(),
      tagline:          String::new(),
      description:      None,
      category_id:      None,
      tag_ids:          Vec::new(),
      tested_with:      Vec::new(),
      content:          content.into(),
      fingerprint:      None,
      explicit_version: None,
      bump:             BumpKind::default(),
      changelog:        None,
      provenance:       Provenance::default(),
      forked_from:      None,
    }
  }
}

/// The resolved identity of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PublishOutcome {
  pub soul_id:          Uuid,
  pub version_id:       Uuid,
  pub resolved_version: String,
  pub is_new_soul:      bool,
}

// ─── Slug availability ───────────────────────────────────────────────────────

/// Result of [`SoulStore::check_slug`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SlugAvailability {
  pub available:             bool,
  /// The slug is taken, but by the asking actor — publishing would append a
  /// version rather than conflict.
  pub is_owner_already:      bool,
  pub current_version_count: Option<u64>,
}

// ─── Activity types ──────────────────────────────────────────────────────────

/// Result of [`SoulStore::track_download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DownloadOutcome {
  pub success:      bool,
  /// The same authenticated actor already downloaded this soul within the
  /// last 24 hours; nothing was counted.
  pub deduplicated: bool,
}

// ─── Listing types ───────────────────────────────────────────────────────────

/// Parameters for [`SoulStore::list_souls`].
#[derive(Debug, Clone, Default)]
pub struct SoulQuery {
  pub category:    Option<Uuid>,
  pub tag:         Option<Uuid>,
  pub tested_with: Option<String>,
  pub sort:        SortKey,
  pub limit:       Option<usize>,
  /// Opaque keyset cursor from a previous page. Ignored for
  /// [`SortKey::Hot`], which is a snapshot, not a paginated feed.
  pub cursor:      Option<String>,
}

/// One page of souls plus the cursor for the next page. `next_cursor` is
/// `None` on the last page and always `None` for the hot sort.
#[derive(Debug, Clone)]
pub struct SoulPage {
  pub souls:       Vec<Soul>,
  pub next_cursor: Option<String>,
}

// ─── Error seam ──────────────────────────────────────────────────────────────

/// Implemented by backend error types so transport layers can surface the
/// domain taxonomy (conflict vs. not-found vs. invalid input) without
/// depending on a concrete backend.
pub trait AsCoreError {
  /// The underlying domain error, when this failure is one.
  fn as_core(&self) -> Option<&crate::Error>;
}

impl AsCoreError for crate::Error {
  fn as_core(&self) -> Option<&crate::Error> {
    Some(self)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a souldir storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SoulStore: Send + Sync {
  type Error: std::error::Error + AsCoreError + Send + Sync + 'static;

  // ── Resolution ────────────────────────────────────────────────────────

  /// Look up a live soul by `(owner_namespace, slug)`. Soft-deleted souls
  /// resolve to `None`.
  fn resolve_soul<'a>(
    &'a self,
    owner_namespace: &'a str,
    slug: &'a str,
  ) -> impl Future<Output = Result<Option<Soul>, Self::Error>> + Send + 'a;

  /// Fetch a soul by id, live or not. Returns `None` only when the row is
  /// absent entirely.
  fn get_soul(
    &self,
    soul_id: Uuid,
  ) -> impl Future<Output = Result<Option<Soul>, Self::Error>> + Send + '_;

  /// Check whether `(owner_namespace, slug)` is free, already the actor's,
  /// or taken by someone else.
  fn check_slug<'a>(
    &'a self,
    owner_namespace: &'a str,
    slug: &'a str,
    actor: Option<Uuid>,
  ) -> impl Future<Output = Result<SlugAvailability, Self::Error>> + Send + 'a;

  // ── Publishing ────────────────────────────────────────────────────────

  /// The publish transaction: validate identifiers, resolve or create the
  /// soul, append a version, update the latest pointer and version counter —
  /// atomically.
  fn publish(
    &self,
    request: PublishRequest,
  ) -> impl Future<Output = Result<PublishOutcome, Self::Error>> + Send + '_;

  /// Soft-delete a soul and cascade to all of its versions in the same
  /// transaction. Owner-only.
  fn soft_delete_soul(
    &self,
    soul_id: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Soft-delete a single version, recount `stats.versions`, and re-point
  /// the latest pointer at the highest remaining sequence. Owner-only.
  fn soft_delete_version<'a>(
    &'a self,
    soul_id: Uuid,
    version: &'a str,
    actor: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Version history ───────────────────────────────────────────────────

  /// All non-deleted versions of a live soul, newest first.
  fn list_versions(
    &self,
    soul_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VersionSummary>, Self::Error>> + Send + '_;

  /// One version by its exact semver string. `None` when absent or
  /// soft-deleted.
  fn get_version<'a>(
    &'a self,
    soul_id: Uuid,
    version: &'a str,
  ) -> impl Future<Output = Result<Option<Version>, Self::Error>> + Send + 'a;

  // ── Fork lineage ──────────────────────────────────────────────────────

  /// Resolve the upstream of a fork for display. Degrades to
  /// [`ForkOrigin::Unavailable`] instead of erroring when the upstream has
  /// since been soft-deleted.
  fn resolve_fork_origin(
    &self,
    soul_id: Uuid,
  ) -> impl Future<Output = Result<ForkOrigin, Self::Error>> + Send + '_;

  // ── Listings ──────────────────────────────────────────────────────────

  /// The general listing: filter, sort, paginate.
  fn list_souls<'a>(
    &'a self,
    query: &'a SoulQuery,
  ) -> impl Future<Output = Result<SoulPage, Self::Error>> + Send + 'a;

  /// Editorially featured souls, most recently updated first.
  fn list_featured(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Soul>, Self::Error>> + Send + '_;

  /// Top souls by the precomputed trending score.
  fn list_trending(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Soul>, Self::Error>> + Send + '_;

  // ── Activity ──────────────────────────────────────────────────────────

  /// Record a download. Authenticated repeat downloads within 24 hours are
  /// reported as deduplicated and not counted; anonymous downloads always
  /// count. A download against a missing or soft-deleted soul reports
  /// `success: false` rather than erroring — it is a fire-and-forget beacon.
  fn track_download<'a>(
    &'a self,
    owner_namespace: &'a str,
    slug: &'a str,
    actor: Option<Uuid>,
  ) -> impl Future<Output = Result<DownloadOutcome, Self::Error>> + Send + 'a;

  /// Record a page view. A no-op against a missing or soft-deleted soul.
  fn track_view<'a>(
    &'a self,
    owner_namespace: &'a str,
    slug: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Star or unstar; returns the new starred state. Unstarring a
  /// never-starred soul is a no-op and never drives the counter negative.
  fn toggle_star(
    &self,
    soul_id: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Upvote or un-upvote; returns the new upvoted state.
  fn toggle_upvote(
    &self,
    soul_id: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Move the comment counter by ±1 on behalf of the external comment
  /// layer. Clamped at zero.
  fn adjust_comments(
    &self,
    soul_id: Uuid,
    delta: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Scheduled scoring ─────────────────────────────────────────────────

  /// Recompute every live soul's trending score from its daily rollups.
  /// Idempotent; per-soul failures are skipped, not fatal. Returns the
  /// number of souls scored.
  fn recompute_trending_scores(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
