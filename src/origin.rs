//! Origin allow-list for the WebSocket endpoint
//!
//! Browsers always send `Origin` on a socket upgrade. When an allow-list is
//! configured, upgrades from any other origin are refused before the
//! handshake. Requests without an `Origin` header (non-browser clients) pass.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, Response, StatusCode},
    middleware::Next,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.is_open() || self.allowed.iter().any(|o| o == origin.trim_end_matches('/'))
    }

    /// CORS matching the same policy
    pub fn cors_layer(&self) -> CorsLayer {
        if self.is_open() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = self
            .allowed
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring unusable origin {:?} for CORS", o);
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

fn forbidden(message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain"),
    );
    response
}

/// Middleware guarding the WebSocket upgrade
pub async fn ws_origin_middleware(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| policy.allows(o))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(origin = ?origin, "Blocked socket from foreign origin");
            return forbidden("Origin not allowed");
        }
    }

    next.run(request).await
}
