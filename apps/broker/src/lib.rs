//! tunl broker
//!
//! Owns the public HTTP listener, the registry of connected agents and the
//! table of in-flight requests. Public requests are routed by subdomain to an
//! agent's WebSocket and answered once the agent sends the correlated response.

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{HeaderValue, Request, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;
use tunl_common::{
    TunnelRequest, TunnelResponse, decode_body, encode_body, flatten_headers, map_to_headers,
    strip_headers,
};

pub mod config;
pub mod handlers;
pub mod pages;
pub mod pending;
pub mod registry;

use config::BrokerConfig;
use pending::PendingRequests;
use registry::Registry;

/// Response headers that describe the agent's transfer, not the bytes we re-serve
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-encoding",
    "transfer-encoding",
    "content-length",
    "connection",
];

/// Process-wide broker state shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub registry: Registry,
    pub pending: PendingRequests,
}

impl AppState {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Registry::new(),
            pending: PendingRequests::new(),
        }
    }
}

/// Build the broker's router: a single fallback handles every method and path
pub fn app(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::handle_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Host the public request was addressed to
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
}

/// Extract the tunnel subdomain from a host by stripping the base domain
///
/// Example: ("bold-calm-fox.example.com", "example.com") -> Some("bold-calm-fox")
///
/// Hosts equal to, or outside of, the base domain yield None. When the host
/// and base domain disagree on ports, the comparison is retried without them.
pub fn extract_subdomain(host: &str, base_domain: &str) -> Option<String> {
    let host = host.trim().to_ascii_lowercase();
    let base = base_domain.trim().trim_start_matches('.').to_ascii_lowercase();

    strip_base_domain(&host, &base)
        .or_else(|| strip_base_domain(strip_port(&host), strip_port(&base)))
}

fn strip_base_domain(host: &str, base: &str) -> Option<String> {
    let prefix = host.strip_suffix(base)?.strip_suffix('.')?;
    (!prefix.is_empty()).then(|| prefix.to_string())
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

/// Serialize a public request for the agent
pub fn build_tunnel_request(parts: &Parts, body: &[u8], id: String) -> TunnelRequest {
    let pathname = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    TunnelRequest {
        id,
        method: parts.method.to_string(),
        pathname,
        headers: flatten_headers(&parts.headers),
        body: if body.is_empty() {
            String::new()
        } else {
            encode_body(body)
        },
    }
}

/// Rebuild an HTTP response from the agent's answer
///
/// The body is decoded, transfer-related headers are dropped and
/// `content-length` is recomputed from the decoded bytes when there are any.
pub fn build_http_response(response: TunnelResponse) -> Response {
    let Ok(status) = StatusCode::from_u16(response.status) else {
        warn!(
            "Agent answered {} with invalid status {}",
            response.id, response.status
        );
        return text_response(StatusCode::BAD_GATEWAY, "Bad Gateway: invalid status from agent");
    };

    let has_body = response.has_body();
    let body = match decode_body(&response.body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Agent answered {} with undecodable body: {}", response.id, e);
            return text_response(
                StatusCode::BAD_GATEWAY,
                "Bad Gateway: malformed response body from agent",
            );
        }
    };

    let mut headers = response.headers;
    let upstream_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| HeaderValue::from_str(value.trim()).ok());
    strip_headers(&mut headers, SKIPPED_RESPONSE_HEADERS);
    let mut header_map = map_to_headers(&headers);

    // Bodiless answers (HEAD, 304) keep the length the origin advertised
    if has_body {
        header_map.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    } else if let Some(length) = upstream_length
        && status != StatusCode::NO_CONTENT
        && !status.is_informational()
    {
        header_map.insert(CONTENT_LENGTH, length);
    }

    let mut http_response = Response::new(Body::from(body));
    *http_response.status_mut() = status;
    *http_response.headers_mut() = header_map;

    let status_text = response.status_text;
    if !status_text.is_empty()
        && status.canonical_reason() != Some(status_text.as_str())
        && let Ok(reason) = hyper::ext::ReasonPhrase::try_from(status_text.as_bytes())
    {
        http_response.extensions_mut().insert(reason);
    }

    http_response
}

/// Plain-text response for errors raised by the broker itself
pub fn text_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.to_string(),
    )
        .into_response()
}
