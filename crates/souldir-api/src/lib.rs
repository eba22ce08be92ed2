//! JSON REST API for souldir.
//!
//! Exposes an axum [`Router`] backed by any [`souldir_core::store::SoulStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility — the
//! `actor` fields in bodies and query strings are trusted as forwarded by
//! the (out-of-scope) auth layer.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", souldir_api::api_router(store.clone()))
//! ```

pub mod activity;
pub mod error;
pub mod souls;
pub mod versions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use souldir_core::store::SoulStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: SoulStore + 'static,
{
  Router::new()
    // Listings
    .route("/souls", get(souls::list::<S>).post(souls::publish::<S>))
    .route("/souls/featured", get(souls::featured::<S>))
    .route("/souls/trending", get(souls::trending::<S>))
    // Resolution by (namespace, slug)
    .route("/souls/{namespace}/{slug}", get(souls::resolve::<S>))
    .route(
      "/souls/{namespace}/{slug}/availability",
      get(souls::availability::<S>),
    )
    .route(
      "/souls/{namespace}/{slug}/download",
      post(activity::download::<S>),
    )
    .route("/souls/{namespace}/{slug}/view", post(activity::view::<S>))
    // Lookup by id
    .route(
      "/souls/id/{id}",
      get(souls::get_one::<S>).delete(souls::delete_one::<S>),
    )
    .route("/souls/id/{id}/fork-origin", get(souls::fork_origin::<S>))
    .route("/souls/id/{id}/versions", get(versions::list::<S>))
    .route(
      "/souls/id/{id}/versions/{semver}",
      get(versions::get_one::<S>).delete(versions::delete_one::<S>),
    )
    .route("/souls/id/{id}/star", post(activity::star::<S>))
    .route("/souls/id/{id}/upvote", post(activity::upvote::<S>))
    .route(
      "/souls/id/{id}/comment-count",
      post(activity::comment_count::<S>),
    )
    .with_state(store)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::json;
  use souldir_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  async fn store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.unwrap())
  }

  async fn send_json(
    store: &Arc<SqliteStore>,
    method: &str,
    uri: &str,
    body: serde_json::Value,
  ) -> axum::response::Response {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    api_router(store.clone()).oneshot(req).await.unwrap()
  }

  async fn send_empty(
    store: &Arc<SqliteStore>,
    method: &str,
    uri: &str,
  ) -> axum::response::Response {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .body(Body::empty())
      .unwrap();
    api_router(store.clone()).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn publish_body(namespace: &str, slug: &str, actor: Uuid) -> serde_json::Value {
    json!({
      "owner_namespace": namespace,
      "slug": slug,
      "actor_id": actor,
      "name": "Test Soul",
      "content": "# content\n",
    })
  }

  // ── Publish ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn publish_returns_created_identity() {
    let s = store().await;
    let resp =
      send_json(&s, "POST", "/souls", publish_body("alice", "coach", Uuid::new_v4()))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_json(resp).await;
    assert_eq!(body["resolved_version"], "1.0.0");
    assert_eq!(body["is_new_soul"], true);
    assert!(body["soul_id"].as_str().is_some());
  }

  #[tokio::test]
  async fn publish_with_bad_slug_is_rejected() {
    let s = store().await;
    let resp = send_json(
      &s,
      "POST",
      "/souls",
      publish_body("alice", "not a slug!", Uuid::new_v4()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn duplicate_explicit_version_conflicts() {
    let s = store().await;
    let actor = Uuid::new_v4();
    let mut body = publish_body("alice", "coach", actor);
    body["version"] = json!("1.0.0");

    let first = send_json(&s, "POST", "/souls", body.clone()).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = send_json(&s, "POST", "/souls", body).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
  }

  // ── Resolution ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn resolve_unknown_soul_returns_404() {
    let s = store().await;
    let resp = send_empty(&s, "GET", "/souls/alice/ghost").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn resolve_after_publish_returns_soul() {
    let s = store().await;
    send_json(&s, "POST", "/souls", publish_body("alice", "coach", Uuid::new_v4()))
      .await;

    let resp = send_empty(&s, "GET", "/souls/alice/coach").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["owner_namespace"], "alice");
    assert_eq!(body["slug"], "coach");
    assert_eq!(body["stats"]["versions"], 1);
  }

  // ── Activity ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn star_toggles_and_reports_state() {
    let s = store().await;
    let created = body_json(
      send_json(&s, "POST", "/souls", publish_body("alice", "coach", Uuid::new_v4()))
        .await,
    )
    .await;
    let soul_id = created["soul_id"].as_str().unwrap().to_owned();
    let voter = Uuid::new_v4();

    let starred = body_json(
      send_json(
        &s,
        "POST",
        &format!("/souls/id/{soul_id}/star"),
        json!({ "actor_id": voter }),
      )
      .await,
    )
    .await;
    assert_eq!(starred["starred"], true);

    let unstarred = body_json(
      send_json(
        &s,
        "POST",
        &format!("/souls/id/{soul_id}/star"),
        json!({ "actor_id": voter }),
      )
      .await,
    )
    .await;
    assert_eq!(unstarred["starred"], false);
  }

  #[tokio::test]
  async fn download_reports_dedup_flag() {
    let s = store().await;
    send_json(&s, "POST", "/souls", publish_body("alice", "coach", Uuid::new_v4()))
      .await;
    let actor = Uuid::new_v4();

    let first = body_json(
      send_json(
        &s,
        "POST",
        "/souls/alice/coach/download",
        json!({ "actor_id": actor }),
      )
      .await,
    )
    .await;
    assert_eq!(first["deduplicated"], false);

    let second = body_json(
      send_json(
        &s,
        "POST",
        "/souls/alice/coach/download",
        json!({ "actor_id": actor }),
      )
      .await,
    )
    .await;
    assert_eq!(second["deduplicated"], true);
  }

  // ── Listings and history ──────────────────────────────────────────────────

  #[tokio::test]
  async fn listing_returns_a_page() {
    let s = store().await;
    let actor = Uuid::new_v4();
    send_json(&s, "POST", "/souls", publish_body("alice", "coach", actor)).await;
    send_json(&s, "POST", "/souls", publish_body("alice", "mentor", actor)).await;

    let resp = send_empty(&s, "GET", "/souls?sort=recent").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["souls"].as_array().unwrap().len(), 2);
    assert!(body["next_cursor"].is_null());
  }

  #[tokio::test]
  async fn version_history_lists_summaries() {
    let s = store().await;
    let actor = Uuid::new_v4();
    let created = body_json(
      send_json(&s, "POST", "/souls", publish_body("alice", "coach", actor)).await,
    )
    .await;
    send_json(&s, "POST", "/souls", publish_body("alice", "coach", actor)).await;
    let soul_id = created["soul_id"].as_str().unwrap().to_owned();

    let resp =
      send_empty(&s, "GET", &format!("/souls/id/{soul_id}/versions")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    let semvers: Vec<&str> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|v| v["semver"].as_str().unwrap())
      .collect();
    assert_eq!(semvers, vec!["1.0.1", "1.0.0"]);
    // Summaries carry no content body.
    assert!(body[0].get("content").is_none());
  }
}
