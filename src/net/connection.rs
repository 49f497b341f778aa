//! Per-connection HTTP serving.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Serve HTTP/1.1 and HTTP/2 with upgrades on one accepted stream
//! - Attach the connection's permit to every request it carries
//! - Drop the connection without a response when a handler asks for it
//! - Stop taking new requests on shutdown and let in-flight ones finish

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::{Body, Bytes},
    BoxError, Router,
};
use hyper::{body::Incoming, Request, Response};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;

use crate::net::listener::ConnectionPermit;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Response extension asking the connection layer to drop the socket instead
/// of writing the response.
#[derive(Debug, Clone, Copy)]
pub struct AbortConnection;

/// Service error that makes hyper close the connection without a reply.
#[derive(Debug, thiserror::Error)]
#[error("connection aborted by handler")]
pub struct ConnectionAborted;

/// Run `app` against one request, turning an [`AbortConnection`] response into
/// a connection-level error.
pub async fn dispatch<B>(app: Router, req: Request<B>) -> Result<Response<Body>, ConnectionAborted>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let response = match app.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.extensions().get::<AbortConnection>().is_some() {
        return Err(ConnectionAborted);
    }
    Ok(response)
}

/// Serve one accepted stream until it closes or shutdown is signalled.
///
/// Each request carries a clone of `permit` in its extensions. A handler that
/// takes over the socket keeps the clone, so the slot stays taken until the
/// upgraded session ends.
pub async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    app: Router,
    permit: ConnectionPermit,
    mut shutdown: broadcast::Receiver<()>,
) {
    let id = ConnectionId::new();
    let service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
        req.extensions_mut().insert(permit.clone());
        dispatch(app.clone(), req)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    match result {
        Ok(()) => tracing::trace!(connection_id = %id, peer_addr = %peer_addr, "Connection closed"),
        Err(e) => tracing::debug!(
            connection_id = %id,
            peer_addr = %peer_addr,
            error = %e,
            "Connection ended with error"
        ),
    }
}
