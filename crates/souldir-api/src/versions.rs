//! Handlers for version history endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/souls/id/{id}/versions` | Summaries, newest first |
//! | `GET`    | `/souls/id/{id}/versions/{semver}` | Full version incl. content |
//! | `DELETE` | `/souls/id/{id}/versions/{semver}` | `?actor=`; owner-only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use souldir_core::{
  store::SoulStore,
  version::{Version, VersionSummary},
};
use uuid::Uuid;

use crate::{error::ApiError, souls::ActorParams};

/// `GET /souls/id/:id/versions`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<VersionSummary>>, ApiError>
where
  S: SoulStore,
{
  let versions = store
    .list_versions(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(versions))
}

/// `GET /souls/id/:id/versions/:semver`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((id, semver)): Path<(Uuid, String)>,
) -> Result<Json<Version>, ApiError>
where
  S: SoulStore,
{
  let version = store
    .get_version(id, &semver)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("version {semver} not found for soul {id}"))
    })?;
  Ok(Json(version))
}

/// `DELETE /souls/id/:id/versions/:semver?actor=...`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path((id, semver)): Path<(Uuid, String)>,
  Query(params): Query<ActorParams>,
) -> Result<StatusCode, ApiError>
where
  S: SoulStore,
{
  store
    .soft_delete_version(id, &semver, params.actor)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
