//! Best-effort `lastActivityAt` updates.
//!
//! Touches are fire-and-forget: the caller never waits on the store and a
//! failed write is logged and counted, nothing more. Liveness must never hold
//! up a handshake or a frame.
//!
//! Touches may reach the store out of order. The store keeps the newest
//! `lastActivityAt`, so a late write never rewinds it.

use std::sync::Arc;

use crate::clock::MonotonicClock;
use crate::observability::GatewayMetrics;
use crate::project::{ProjectPatch, RoomToken};
use crate::store::ProjectStore;

#[derive(Clone)]
pub struct Liveness {
    store: Arc<dyn ProjectStore>,
    clock: Arc<MonotonicClock>,
    metrics: GatewayMetrics,
}

impl Liveness {
    pub fn new(store: Arc<dyn ProjectStore>, clock: Arc<MonotonicClock>, metrics: GatewayMetrics) -> Self {
        Self { store, clock, metrics }
    }

    /// Record activity on `room` now. Returns immediately.
    pub fn touch(&self, room: &RoomToken) -> tokio::task::JoinHandle<()> {
        let patch = ProjectPatch::touched(self.clock.now());
        let store = Arc::clone(&self.store);
        let metrics = self.metrics.clone();
        let room = room.clone();

        tokio::spawn(async move {
            if let Err(e) = store.merge_fields(&room, &patch).await {
                tracing::debug!(room = %room, error = %e, "Liveness update dropped");
                metrics.record_touch_failure();
            }
        })
    }
}
