//! Request accounting middleware.
//! Counts every HTTP response by method and status.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::net::AbortConnection;
use crate::observability::GatewayMetrics;

pub async fn track_requests(
    State(metrics): State<GatewayMetrics>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;

    // Aborted connections never produce a response on the wire.
    if response.extensions().get::<AbortConnection>().is_none() {
        metrics.record_request(method.as_str(), response.status().as_u16());
    }
    response
}
