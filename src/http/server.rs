//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the project API and the room upgrade path
//! - Wire up middleware (tracing, request ID, timeout, limits, origin gate)
//! - Run the accept loop and hand each connection to hyper
//! - Stop accepting on shutdown and drain live sessions

use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderValue, Uri},
    Extension,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::error::ApiError;
use crate::http::middleware::track_requests;
use crate::http::projects;
use crate::http::GatewayState;
use crate::net::{serve_connection, ConnectionPermit, Listener, ListenerError};
use crate::security::cors_gate;
use crate::session::room_upgrade;

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: GatewayState, config: &GatewayConfig) -> Router {
    let mut router = Router::new()
        .route("/projects", post(projects::create_project))
        .route("/projects/{token}", get(projects::get_project))
        .route("/projects/{token}/lock", post(projects::lock_project))
        .route("/projects/{token}/unlock", post(projects::unlock_project))
        .route("/healthz", get(projects::healthz))
        .route("/metrics", get(projects::metrics))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(middleware::from_fn_with_state(state.allow_list.clone(), cors_gate))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

    if config.security.enable_headers {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));
    }

    router
        .layer(middleware::from_fn_with_state(state.metrics.clone(), track_requests))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Everything under `/yjs` is a room upgrade; anything else is unknown.
async fn fallback(
    state: State<GatewayState>,
    uri: Uri,
    permit: Option<Extension<ConnectionPermit>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let path = uri.path();
    if path == "/yjs" || path.starts_with("/yjs/") {
        room_upgrade(state, uri, permit, ws).await
    } else {
        ApiError::NotFound.into_response()
    }
}

/// HTTP server for the collaboration gateway.
pub struct GatewayServer {
    router: Router,
    state: GatewayState,
    drain: Duration,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, state: GatewayState) -> Self {
        Self {
            router: build_router(state.clone(), config),
            state,
            drain: Duration::from_secs(config.timeouts.shutdown_drain_secs),
        }
    }

    /// Accept connections until shutdown, then wait for sessions to drain.
    pub async fn run(self, listener: Listener) -> Result<(), ListenerError> {
        let shutdown = self.state.shutdown.clone();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        while !shutdown.is_triggered() {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        let app = self.router.clone();
                        let conn_shutdown = shutdown.subscribe();
                        tokio::spawn(serve_connection(stream, peer_addr, app, permit, conn_shutdown));
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown.wait() => break,
            }
        }

        tracing::info!(
            active_sessions = self.state.sessions.active_count(),
            "Stopped accepting connections, draining sessions"
        );

        if tokio::time::timeout(self.drain, self.state.sessions.wait_for_drain())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.state.sessions.active_count(),
                "Drain deadline passed, dropping remaining sessions"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
