//! Handlers for soul resolution, publishing, and listings.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/souls` | `?sort=recent\|published\|popular\|trending\|stars\|hot` plus filters |
//! | `POST`   | `/souls` | Publish; body is [`PublishBody`] |
//! | `GET`    | `/souls/featured` | `?limit=` |
//! | `GET`    | `/souls/trending` | `?limit=` |
//! | `GET`    | `/souls/{namespace}/{slug}` | 404 if absent or soft-deleted |
//! | `GET`    | `/souls/{namespace}/{slug}/availability` | `?actor=` |
//! | `GET`    | `/souls/id/{id}` | Lookup by id |
//! | `DELETE` | `/souls/id/{id}` | `?actor=`; owner-only soft delete |
//! | `GET`    | `/souls/id/{id}/fork-origin` | Lineage, degrades gracefully |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use souldir_core::{
  rank::SortKey,
  soul::{ForkOrigin, Soul},
  store::{PublishOutcome, SlugAvailability, SoulQuery, SoulStore},
  version::{BumpKind, Provenance},
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub category:    Option<Uuid>,
  pub tag:         Option<Uuid>,
  pub tested_with: Option<String>,
  #[serde(default)]
  pub sort:        SortKey,
  pub limit:       Option<usize>,
  pub cursor:      Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub souls:       Vec<Soul>,
  /// Absent on the last page and always absent for `sort=hot`.
  pub next_cursor: Option<String>,
}

/// `GET /souls[?sort=...][&category=...][&tag=...][&tested_with=...][&limit=...][&cursor=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError>
where
  S: SoulStore,
{
  let query = SoulQuery {
    category:    params.category,
    tag:         params.tag,
    tested_with: params.tested_with,
    sort:        params.sort,
    limit:       params.limit,
    cursor:      params.cursor,
  };

  let page = store
    .list_souls(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ListResponse {
    souls:       page.souls,
    next_cursor: page.next_cursor,
  }))
}

// ─── Convenience windows ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WindowParams {
  pub limit: Option<usize>,
}

/// `GET /souls/featured[?limit=...]`
pub async fn featured<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<WindowParams>,
) -> Result<Json<Vec<Soul>>, ApiError>
where
  S: SoulStore,
{
  let souls = store
    .list_featured(params.limit.unwrap_or(10))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(souls))
}

/// `GET /souls/trending[?limit=...]`
pub async fn trending<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<WindowParams>,
) -> Result<Json<Vec<Soul>>, ApiError>
where
  S: SoulStore,
{
  let souls = store
    .list_trending(params.limit.unwrap_or(10))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(souls))
}

// ─── Publish ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PublishBody {
  pub owner_namespace: String,
  pub slug:            String,
  /// The authenticated publisher, forwarded by the auth layer.
  pub actor_id:        Uuid,
  pub name:            String,
  #[serde(default)]
  pub tagline:         String,
  pub description:     Option<String>,
  pub category_id:     Option<Uuid>,
  #[serde(default)]
  pub tag_ids:         Vec<Uuid>,
  #[serde(default)]
  pub tested_with:     Vec<String>,
  pub content:         String,
  pub fingerprint:     Option<String>,
  /// Exact version to assign; when absent, `bump` derives one.
  pub version:         Option<String>,
  #[serde(default)]
  pub bump:            BumpKind,
  pub changelog:       Option<String>,
  #[serde(default)]
  pub provenance:      Provenance,
  pub forked_from:     Option<Uuid>,
}

/// `POST /souls`
pub async fn publish<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<PublishBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SoulStore,
{
  let request = souldir_core::store::PublishRequest {
    owner_namespace:  body.owner_namespace,
    slug:             body.slug,
    actor:            body.actor_id,
    name:             body.name,
    tagline:          body.tagline,
    description:      body.description,
    category_id:      body.category_id,
    tag_ids:          body.tag_ids,
    tested_with:      body.tested_with,
    content:          body.content,
    fingerprint:      body.fingerprint,
    explicit_version: body.version,
    bump:             body.bump,
    changelog:        body.changelog,
    provenance:       body.provenance,
    forked_from:      body.forked_from,
  };

  let outcome: PublishOutcome =
    store.publish(request).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// `GET /souls/:namespace/:slug`
pub async fn resolve<S>(
  State(store): State<Arc<S>>,
  Path((namespace, slug)): Path<(String, String)>,
) -> Result<Json<Soul>, ApiError>
where
  S: SoulStore,
{
  let soul = store
    .resolve_soul(&namespace, &slug)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("soul {namespace}/{slug} not found"))
    })?;
  Ok(Json(soul))
}

/// `GET /souls/id/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Soul>, ApiError>
where
  S: SoulStore,
{
  let soul = store
    .get_soul(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("soul {id} not found")))?;
  Ok(Json(soul))
}

// ─── Slug availability ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
  pub actor: Option<Uuid>,
}

/// `GET /souls/:namespace/:slug/availability[?actor=...]`
pub async fn availability<S>(
  State(store): State<Arc<S>>,
  Path((namespace, slug)): Path<(String, String)>,
  Query(params): Query<AvailabilityParams>,
) -> Result<Json<SlugAvailability>, ApiError>
where
  S: SoulStore,
{
  let availability = store
    .check_slug(&namespace, &slug, params.actor)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(availability))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActorParams {
  pub actor: Uuid,
}

/// `DELETE /souls/id/:id?actor=...`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ActorParams>,
) -> Result<StatusCode, ApiError>
where
  S: SoulStore,
{
  store
    .soft_delete_soul(id, params.actor)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Fork lineage ────────────────────────────────────────────────────────────

/// `GET /souls/id/:id/fork-origin`
pub async fn fork_origin<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ForkOrigin>, ApiError>
where
  S: SoulStore,
{
  let origin = store
    .resolve_fork_origin(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(origin))
}
