//! Origin gate.
//!
//! Runs in front of every route, including the WebSocket upgrade.
//!
//! ```text
//! no Origin header          → pass through untouched
//! Origin unparseable        → 403, empty body
//! Origin host not allowed   → 403, empty body
//! Origin allowed            → echo origin, Vary: Origin
//!     + OPTIONS             → 204 preflight, handler not run
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const PREFLIGHT_ALLOW_METHODS: &str = "GET,POST,OPTIONS";
pub const PREFLIGHT_ALLOW_HEADERS: &str = "Content-Type";

/// Hosts (`host[:port]`) whose browser origins may call the gateway.
///
/// Swappable at runtime for config hot reload.
#[derive(Clone, Debug)]
pub struct OriginAllowList {
    hosts: Arc<ArcSwap<HashSet<String>>>,
}

impl OriginAllowList {
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        Self {
            hosts: Arc::new(ArcSwap::from_pointee(normalize(origins))),
        }
    }

    /// Replace the allow-list for all subsequent requests.
    pub fn replace<S: AsRef<str>>(&self, origins: &[S]) {
        self.hosts.store(Arc::new(normalize(origins)));
    }

    /// Whether a raw `Origin` header value is allowed.
    pub fn allows(&self, origin: &str) -> bool {
        match origin_host(origin) {
            Some(host) => self.hosts.load().contains(&host),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize<S: AsRef<str>>(origins: &[S]) -> HashSet<String> {
    origins
        .iter()
        .map(|o| o.as_ref().trim().to_ascii_lowercase())
        .filter(|o| !o.is_empty())
        .collect()
}

/// `host[:port]` of an origin URL; default ports are omitted.
pub fn origin_host(origin: &str) -> Option<String> {
    let url = url::Url::parse(origin).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

pub async fn cors_gate(
    State(allow_list): State<OriginAllowList>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = match req.headers().get(header::ORIGIN) {
        Some(origin) => origin.clone(),
        None => return next.run(req).await,
    };

    let allowed = origin
        .to_str()
        .map(|o| allow_list.allows(o))
        .unwrap_or(false);

    if !allowed {
        tracing::warn!(
            origin = ?origin,
            path = %req.uri().path(),
            "Origin rejected"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut response = if req.method() == Method::OPTIONS {
        preflight()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    response
}

fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(PREFLIGHT_ALLOW_METHODS),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(PREFLIGHT_ALLOW_HEADERS),
            ),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(allowed: &[&str]) -> Router {
        let allow_list = OriginAllowList::new(allowed);
        Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(allow_list, cors_gate))
    }

    fn request(method: Method, origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/healthz");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn origin_host_keeps_explicit_port_only() {
        assert_eq!(origin_host("http://localhost:3000").as_deref(), Some("localhost:3000"));
        assert_eq!(origin_host("https://app.example.com").as_deref(), Some("app.example.com"));
        assert_eq!(origin_host("https://app.example.com:443").as_deref(), Some("app.example.com"));
        assert_eq!(origin_host("null"), None);
        assert_eq!(origin_host("not a url"), None);
    }

    #[test]
    fn replace_swaps_hosts() {
        let list = OriginAllowList::new(&["localhost:3000"]);
        assert!(list.allows("http://localhost:3000"));

        list.replace(&["editor.example.com"]);
        assert!(!list.allows("http://localhost:3000"));
        assert!(list.allows("https://editor.example.com"));
    }

    #[tokio::test]
    async fn no_origin_passes_through_untouched() {
        let res = app(&["localhost:3000"])
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn allowed_origin_is_echoed_exactly() {
        let res = app(&["allowed.example"])
            .oneshot(request(Method::GET, Some("http://allowed.example")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://allowed.example"
        );
        assert_eq!(res.headers()[header::VARY], "Origin");
    }

    #[tokio::test]
    async fn unknown_or_invalid_origin_is_forbidden() {
        for origin in ["http://evil.com", "null", "::::"] {
            let res = app(&["localhost:3000"])
                .oneshot(request(Method::GET, Some(origin)))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::FORBIDDEN, "{origin}");
            let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let res = app(&["localhost:3000"])
            .oneshot(request(Method::OPTIONS, Some("http://localhost:3000")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            PREFLIGHT_ALLOW_METHODS
        );
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn preflight_from_unknown_origin_is_forbidden() {
        let res = app(&["localhost:3000"])
            .oneshot(request(Method::OPTIONS, Some("http://evil.com")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
