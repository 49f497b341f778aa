//! Synchronization engine seam.
//!
//! After a handshake the gateway hands each connection to a [`SyncEngine`] as
//! a [`SyncPeer`]: a stream of inbound frames and a sink for outbound ones.
//! The engine owns everything about those frames (CRDT sync, awareness); the
//! gateway only taps the inbound side for liveness.
//!
//! [`RelayEngine`] is the built-in engine: a per-room fan-out that forwards
//! every frame to the other peers of the same room without decoding it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::project::RoomToken;
use crate::session::registry::SessionId;

/// One accepted connection, as seen by the sync engine.
pub struct SyncPeer {
    pub session_id: SessionId,
    pub room: RoomToken,
    /// Data frames from the client. Ends when the session closes.
    pub inbound: mpsc::Receiver<Message>,
    /// Frames to the client.
    pub outbound: mpsc::Sender<Message>,
}

#[async_trait]
pub trait SyncEngine: Send + Sync + 'static {
    /// Serve one peer until its inbound stream ends.
    async fn serve(&self, peer: SyncPeer);
}

#[derive(Clone)]
struct Relayed {
    from: SessionId,
    message: Message,
}

/// Room-scoped frame relay.
pub struct RelayEngine {
    rooms: Arc<DashMap<RoomToken, broadcast::Sender<Relayed>>>,
    capacity: usize,
}

impl RelayEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Rooms with at least one connected peer.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn join(&self, room: &RoomToken) -> (broadcast::Sender<Relayed>, broadcast::Receiver<Relayed>) {
        // Subscribe under the shard lock so `leave` cannot drop a room a peer is joining.
        let entry = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let rx = entry.subscribe();
        (entry.clone(), rx)
    }

    fn leave(&self, room: &RoomToken) {
        if self.rooms.remove_if(room, |_, tx| tx.receiver_count() == 0).is_some() {
            tracing::debug!(room = %room, rooms = self.room_count(), "Room released");
        }
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl SyncEngine for RelayEngine {
    async fn serve(&self, mut peer: SyncPeer) {
        let (tx, mut rx) = self.join(&peer.room);
        let me = peer.session_id;

        loop {
            tokio::select! {
                inbound = peer.inbound.recv() => match inbound {
                    Some(message) => {
                        let _ = tx.send(Relayed { from: me, message });
                    }
                    None => break,
                },
                relayed = rx.recv() => match relayed {
                    Ok(relayed) if relayed.from == me => {}
                    Ok(relayed) => {
                        if peer.outbound.send(relayed.message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            room = %peer.room,
                            session_id = %me,
                            skipped,
                            "Peer fell behind, frames dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        drop(rx);
        self.leave(&peer.room);
    }
}
