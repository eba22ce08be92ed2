//! Handlers for the activity endpoints: downloads, views, stars, upvotes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/souls/{namespace}/{slug}/download` | Body: `{"actor_id": ...?}` |
//! | `POST` | `/souls/{namespace}/{slug}/view` | No body |
//! | `POST` | `/souls/id/{id}/star` | Body: `{"actor_id": ...}` |
//! | `POST` | `/souls/id/{id}/upvote` | Body: `{"actor_id": ...}` |
//! | `POST` | `/souls/id/{id}/comment-count` | Body: `{"delta": 1\|-1}`; for the comment service |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use souldir_core::store::{DownloadOutcome, SoulStore};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Downloads ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct DownloadBody {
  /// Present for authenticated downloads; they deduplicate per 24 hours.
  pub actor_id: Option<Uuid>,
}

/// `POST /souls/:namespace/:slug/download`
pub async fn download<S>(
  State(store): State<Arc<S>>,
  Path((namespace, slug)): Path<(String, String)>,
  body: Option<Json<DownloadBody>>,
) -> Result<Json<DownloadOutcome>, ApiError>
where
  S: SoulStore,
{
  let actor = body.map(|Json(b)| b.actor_id).unwrap_or_default();
  let outcome = store
    .track_download(&namespace, &slug, actor)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcome))
}

/// `POST /souls/:namespace/:slug/view`
pub async fn view<S>(
  State(store): State<Arc<S>>,
  Path((namespace, slug)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  S: SoulStore,
{
  store
    .track_view(&namespace, &slug)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Stars and upvotes ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActorBody {
  pub actor_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StarResponse {
  pub starred: bool,
}

/// `POST /souls/id/:id/star`
pub async fn star<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<StarResponse>, ApiError>
where
  S: SoulStore,
{
  let starred = store
    .toggle_star(id, body.actor_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(StarResponse { starred }))
}

#[derive(Debug, Serialize)]
pub struct UpvoteResponse {
  pub upvoted: bool,
}

/// `POST /souls/id/:id/upvote`
pub async fn upvote<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<UpvoteResponse>, ApiError>
where
  S: SoulStore,
{
  let upvoted = store
    .toggle_upvote(id, body.actor_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(UpvoteResponse { upvoted }))
}

// ─── Comment counter ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CommentDeltaBody {
  pub delta: i64,
}

/// `POST /souls/id/:id/comment-count` — the comment service reports thread
/// growth and shrinkage here; the counter clamps at zero.
pub async fn comment_count<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CommentDeltaBody>,
) -> Result<StatusCode, ApiError>
where
  S: SoulStore,
{
  store
    .adjust_comments(id, body.delta)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
