//! Project API handlers.
//!
//! ```text
//! POST /projects                 → {token, ownerKey}
//! GET  /projects/{token}         → {token, locked, lastActivityAt}
//! POST /projects/{token}/lock    {ownerKey} → {ok: true}
//! POST /projects/{token}/unlock  {ownerKey} → {ok: true}
//! GET  /healthz                  → {status: "ok"}
//! GET  /metrics                  → Prometheus text
//! ```
//!
//! The owner key leaves the gateway exactly once, in the creation response.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::error::{ApiError, ApiResult};
use crate::http::GatewayState;
use crate::project::{ProjectPatch, RoomToken, Timestamp};
use crate::security::{generate_owner_key, generate_token};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProject {
    pub token: RoomToken,
    pub owner_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub token: RoomToken,
    pub locked: bool,
    pub last_activity_at: Timestamp,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerProof {
    #[serde(default)]
    owner_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn create_project(State(state): State<GatewayState>) -> ApiResult<Json<CreatedProject>> {
    let token = generate_token();
    let owner_key = generate_owner_key();

    state.store.create(&token, &owner_key, state.clock.now()).await?;
    tracing::info!(room = %token, "Project created");

    Ok(Json(CreatedProject {
        token,
        owner_key: owner_key.expose().to_string(),
    }))
}

pub async fn get_project(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<ProjectView>> {
    let token = RoomToken::parse(&raw).map_err(|_| ApiError::NotFound)?;
    let meta = state.store.get(&token).await?.ok_or(ApiError::NotFound)?;

    Ok(Json(ProjectView {
        token: meta.token,
        locked: meta.locked,
        last_activity_at: meta.last_activity_at,
    }))
}

pub async fn lock_project(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Ack>> {
    set_locked(&state, &raw, &body, true).await
}

pub async fn unlock_project(
    State(state): State<GatewayState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Ack>> {
    set_locked(&state, &raw, &body, false).await
}

/// Existence first, then ownership, then the write. A body that does not
/// parse proves nothing and is treated as a wrong key.
async fn set_locked(state: &GatewayState, raw: &str, body: &[u8], locked: bool) -> ApiResult<Json<Ack>> {
    let token = RoomToken::parse(raw).map_err(|_| ApiError::NotFound)?;
    let meta = state.store.get(&token).await?.ok_or(ApiError::NotFound)?;

    let proof: OwnerProof = serde_json::from_slice(body).unwrap_or_default();
    if !meta.is_owned_by(proof.owner_key.as_deref()) {
        tracing::warn!(room = %token, locked, "Lock change refused: owner key mismatch");
        return Err(ApiError::Forbidden);
    }

    state.store.merge_fields(&token, &ProjectPatch::locked(locked)).await?;
    tracing::info!(room = %token, locked, "Project lock changed");

    Ok(Json(Ack { ok: true }))
}

pub async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn metrics(State(state): State<GatewayState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::GatewayConfig;
    use crate::http::{build_router, GatewayState};
    use crate::lifecycle::Shutdown;
    use crate::observability::GatewayMetrics;
    use crate::project::{OwnerKey, Timestamp};
    use crate::session::RelayEngine;
    use crate::store::{MemoryStore, ProjectStore};

    fn app_with(store: Arc<MemoryStore>) -> Router {
        let config = GatewayConfig::default();
        let state = GatewayState::new(
            &config,
            store,
            Arc::new(RelayEngine::default()),
            GatewayMetrics::new(),
            Arc::new(Shutdown::new()),
        );
        build_router(state, &config)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn create_then_lock_and_unlock() {
        let app = app_with(Arc::new(MemoryStore::new()));

        let (status, created) = call(&app, Method::POST, "/projects", None).await;
        assert_eq!(status, StatusCode::OK);
        let token = created["token"].as_str().unwrap().to_string();
        let key = created["ownerKey"].as_str().unwrap().to_string();

        let (status, ack) = call(
            &app,
            Method::POST,
            &format!("/projects/{token}/lock"),
            Some(json!({ "ownerKey": key })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({ "ok": true }));

        let (_, view) = call(&app, Method::GET, &format!("/projects/{token}"), None).await;
        assert_eq!(view["locked"], json!(true));
        assert!(view.get("ownerKey").is_none());

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/projects/{token}/unlock"),
            Some(json!({ "ownerKey": "zz" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, view) = call(&app, Method::GET, &format!("/projects/{token}"), None).await;
        assert_eq!(view["locked"], json!(true));

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/projects/{token}/unlock"),
            Some(json!({ "ownerKey": key })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, view) = call(&app, Method::GET, &format!("/projects/{token}"), None).await;
        assert_eq!(view["locked"], json!(false));
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let app = app_with(Arc::new(MemoryStore::new()));

        let (status, body) = call(&app, Method::GET, "/projects/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "not_found" }));

        let (status, _) = call(
            &app,
            Method::POST,
            "/projects/nope/lock",
            Some(json!({ "ownerKey": "anything" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_or_garbled_body_is_forbidden() {
        let store = Arc::new(MemoryStore::new());
        let token = crate::project::RoomToken::parse("ab12").unwrap();
        store.create(&token, &OwnerKey::new("k9"), Timestamp(5)).await.unwrap();
        let app = app_with(store.clone());

        let (status, _) = call(&app, Method::POST, "/projects/ab12/lock", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::POST, "/projects/ab12/lock", Some(json!("k9"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert!(!store.get(&token).await.unwrap().unwrap().locked);
    }

    #[tokio::test]
    async fn ownerless_record_cannot_be_locked() {
        let store = Arc::new(MemoryStore::new());
        let token = crate::project::RoomToken::parse("ghost").unwrap();
        store
            .merge_fields(&token, &crate::project::ProjectPatch::touched(Timestamp(9)))
            .await
            .unwrap();
        let app = app_with(store);

        let (status, view) = call(&app, Method::GET, "/projects/ghost", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["lastActivityAt"], json!(9));

        let (status, _) = call(
            &app,
            Method::POST,
            "/projects/ghost/lock",
            Some(json!({ "ownerKey": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn healthz_and_metrics() {
        let app = app_with(Arc::new(MemoryStore::new()));

        let (status, body) = call(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let res = app
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    }

    #[tokio::test]
    async fn unknown_routes_get_json_not_found() {
        let app = app_with(Arc::new(MemoryStore::new()));
        let (status, body) = call(&app, Method::GET, "/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "not_found" }));
    }
}
