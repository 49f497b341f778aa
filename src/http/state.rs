//! Shared handler state.

use std::sync::Arc;

use crate::clock::MonotonicClock;
use crate::config::{ExistenceCheck, GatewayConfig};
use crate::lifecycle::Shutdown;
use crate::observability::GatewayMetrics;
use crate::security::OriginAllowList;
use crate::session::{Liveness, SessionRegistry, SyncEngine};
use crate::store::ProjectStore;

/// Everything a handler may touch, built once at startup and injected.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<dyn ProjectStore>,
    pub metrics: GatewayMetrics,
    pub clock: Arc<MonotonicClock>,
    pub engine: Arc<dyn SyncEngine>,
    pub sessions: SessionRegistry,
    pub liveness: Liveness,
    pub room_check: ExistenceCheck,
    pub allow_list: OriginAllowList,
    pub shutdown: Arc<Shutdown>,
}

impl GatewayState {
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn ProjectStore>,
        engine: Arc<dyn SyncEngine>,
        metrics: GatewayMetrics,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let clock = Arc::new(MonotonicClock::new());
        Self {
            liveness: Liveness::new(Arc::clone(&store), Arc::clone(&clock), metrics.clone()),
            sessions: SessionRegistry::new(metrics.clone()),
            allow_list: OriginAllowList::new(&config.cors.allowed_origins),
            room_check: config.rooms.existence_check,
            store,
            metrics,
            clock,
            engine,
            shutdown,
        }
    }
}
