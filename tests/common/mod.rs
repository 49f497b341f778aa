//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use collab_gateway::config::{ExistenceCheck, GatewayConfig};
use collab_gateway::http::{GatewayServer, GatewayState};
use collab_gateway::lifecycle::Shutdown;
use collab_gateway::net::Listener;
use collab_gateway::observability::GatewayMetrics;
use collab_gateway::project::{OwnerKey, ProjectMeta, ProjectPatch, RoomToken, Timestamp};
use collab_gateway::session::{RelayEngine, SyncEngine, SyncPeer};
use collab_gateway::store::{open_store, ProjectStore, StoreError};

pub const ALLOWED_ORIGIN: &str = "http://allowed.example";

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub server: tokio::task::JoinHandle<()>,
}

impl TestGateway {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn shutdown(&self) -> Arc<Shutdown> {
        Arc::clone(&self.state.shutdown)
    }

    /// Create a project through the API and return `(token, ownerKey)`.
    pub async fn create_project(&self) -> (String, String) {
        let created: serde_json::Value = reqwest::Client::new()
            .post(self.http("/projects"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        (
            created["token"].as_str().unwrap().to_string(),
            created["ownerKey"].as_str().unwrap().to_string(),
        )
    }

    pub async fn metrics(&self) -> String {
        reqwest::get(self.http("/metrics")).await.unwrap().text().await.unwrap()
    }
}

pub fn test_config(check: ExistenceCheck) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.store.url = "memory://".to_string();
    config.rooms.existence_check = check;
    config.cors.allowed_origins = vec!["allowed.example".to_string(), "localhost:3000".to_string()];
    config.timeouts.shutdown_drain_secs = 2;
    config
}

/// Start a gateway backed by the in-memory store.
pub async fn spawn_gateway(check: ExistenceCheck) -> TestGateway {
    let config = test_config(check);
    let store = open_store(&config.store).unwrap();
    spawn_gateway_with(config, store).await
}

/// Start a gateway with an explicit store.
pub async fn spawn_gateway_with(config: GatewayConfig, store: Arc<dyn ProjectStore>) -> TestGateway {
    spawn_gateway_with_engine(config, store, Arc::new(RelayEngine::default())).await
}

/// Start a gateway with an explicit store and sync engine.
pub async fn spawn_gateway_with_engine(
    config: GatewayConfig,
    store: Arc<dyn ProjectStore>,
    engine: Arc<dyn SyncEngine>,
) -> TestGateway {
    let state = GatewayState::new(
        &config,
        store,
        engine,
        GatewayMetrics::new(),
        Arc::new(Shutdown::new()),
    );

    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let server = GatewayServer::new(&config, state.clone());
    let server = tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    TestGateway { addr, state, server }
}

/// Value of one sample line in a Prometheus rendering.
pub fn sample(rendered: &str, series: &str) -> Option<f64> {
    rendered
        .lines()
        .find_map(|line| line.strip_prefix(series)?.trim().parse().ok())
}

const POLLS: usize = 50;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Wait until exactly `expected` sessions are registered.
pub async fn wait_for_sessions(gw: &TestGateway, expected: usize) -> bool {
    for _ in 0..POLLS {
        if gw.state.sessions.active_count() == expected {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}

/// Wait until a metric series reaches `expected`.
pub async fn wait_for_sample(gw: &TestGateway, series: &str, expected: f64) -> bool {
    for _ in 0..POLLS {
        if sample(&gw.metrics().await, series) == Some(expected) {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}

/// `GET /projects/{token}`, or `None` on 404.
pub async fn project(gw: &TestGateway, token: &str) -> Option<serde_json::Value> {
    let res = reqwest::get(gw.http(&format!("/projects/{}", token))).await.unwrap();
    if res.status() == reqwest::StatusCode::NOT_FOUND {
        return None;
    }
    Some(res.json().await.unwrap())
}

/// Wait until the project record exists.
pub async fn wait_for_project(gw: &TestGateway, token: &str) -> Option<serde_json::Value> {
    for _ in 0..POLLS {
        if let Some(view) = project(gw, token).await {
            return Some(view);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    None
}

/// An engine that accepts peers but never reads from them.
pub struct StalledEngine;

#[async_trait]
impl SyncEngine for StalledEngine {
    async fn serve(&self, _peer: SyncPeer) {
        std::future::pending::<()>().await
    }
}

/// A store whose every call fails.
pub struct UnreachableStore;

#[async_trait]
impl ProjectStore for UnreachableStore {
    async fn create(&self, _: &RoomToken, _: &OwnerKey, _: Timestamp) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _: &RoomToken) -> Result<Option<ProjectMeta>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn merge_fields(&self, _: &RoomToken, _: &ProjectPatch) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn exists(&self, _: &RoomToken) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
