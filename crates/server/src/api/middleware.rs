//! Access and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use dorama_core::{AccessLevel, AuthRequest};

use crate::metrics::{
    normalize_path, ACCESS_DECISIONS, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Access middleware that decides how much of the catalog the caller sees.
///
/// Unlike a login wall, missing or wrong credentials never reject the
/// request: the caller gets [`AccessLevel::Preview`]. Only authenticator
/// failures (service down, misconfiguration) produce a 500.
pub async fn access_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Get source IP (default to localhost if not available)
    let source_ip = request
        .extensions()
        .get::<std::net::SocketAddr>()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };
    let result = state.authenticator().authenticate(&auth_request).await;

    match AccessLevel::from_auth_result(result) {
        Ok(level) => {
            let label = if level.has_access() { "full" } else { "preview" };
            ACCESS_DECISIONS.with_label_values(&[label]).inc();
            debug!(access = label, "Access decided");
            request.extensions_mut().insert(level);
            Ok(next.run(request).await)
        }
        Err(e) => {
            ACCESS_DECISIONS.with_label_values(&["error"]).inc();
            error!("Authenticator failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Extractor for the caller's access level.
///
/// Falls back to preview if no level is present (shouldn't happen if the
/// access middleware is properly configured).
#[derive(Debug, Clone, Copy)]
pub struct Access(pub AccessLevel);

impl<S> FromRequestParts<S> for Access
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let level = parts
            .extensions
            .get::<AccessLevel>()
            .copied()
            .unwrap_or(AccessLevel::Preview);
        std::future::ready(Ok(Access(level)))
    }
}
