//! ForwardingHandler - proxy branch
//!
//! Routes a public request to the agent owning its subdomain and answers with
//! whatever the agent sends back for the same correlation id.

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use http_body_util::LengthLimitError;
use tracing::{debug, warn};
use tunl_common::constants::MAX_BODY_SIZE_BYTES;
use tunl_common::{Message, generate_request_id};

use crate::{
    AppState, build_http_response, build_tunnel_request, extract_subdomain, pages, request_host,
    text_response,
};

/// Handle a public request
pub async fn handle_forwarding(state: AppState, request: Request) -> Response {
    let subdomain = match request_host(&request)
        .and_then(|host| extract_subdomain(&host, &state.config.domain))
    {
        Some(subdomain) => subdomain,
        None => return pages::landing(&state.config),
    };

    let Some(agent) = state.registry.lookup(&subdomain) else {
        debug!("No agent for {}", subdomain);
        return pages::not_found(&subdomain);
    };

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_SIZE_BYTES).await {
        Ok(body) => body,
        Err(e) if e.source_is_length_limit() => {
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
        }
        Err(e) => {
            warn!("Failed to read request body for {}: {}", subdomain, e);
            return text_response(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    let id = generate_request_id();
    let tunnel_request = build_tunnel_request(&parts, &body, id.clone());
    debug!(
        "{} {} {} -> {}",
        id, tunnel_request.method, tunnel_request.pathname, subdomain
    );

    // Register before sending so a fast answer always finds its entry
    let waiter = state.pending.register(&id);

    if let Err(e) = agent.send(&Message::Request(tunnel_request)).await {
        warn!("Agent {} unavailable: {}", subdomain, e);
        return text_response(StatusCode::BAD_GATEWAY, "Bad Gateway: tunnel closed");
    }

    let response = waiter.wait(state.config.request_timeout).await;
    build_http_response(response)
}

trait LengthLimitExt {
    fn source_is_length_limit(&self) -> bool;
}

impl LengthLimitExt for axum::Error {
    fn source_is_length_limit(&self) -> bool {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = source {
            if err.is::<LengthLimitError>() {
                return true;
            }
            source = err.source();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BrokerConfig;
    use crate::registry::AgentHandle;
    use crate::{AppState, app};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tower::ServiceExt;
    use tunl_common::{Message, TunnelResponse, decode_body, encode_body};

    fn test_state(timeout: Duration) -> AppState {
        AppState::new(BrokerConfig {
            domain: "example.com".to_string(),
            request_timeout: timeout,
            ..Default::default()
        })
    }

    /// Register an in-process agent that answers every request with `reply`
    fn spawn_agent<F>(state: &AppState, subdomain: &str, reply: F)
    where
        F: Fn(tunl_common::TunnelRequest) -> TunnelResponse + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(16);
        state
            .registry
            .register(Some(subdomain), AgentHandle::new(tx));

        let pending = state.pending.clone();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Ok(Message::Request(request)) = Message::from_json(&text) {
                    let response = reply(request);
                    pending.resolve(&response.id.clone(), response);
                }
            }
        });
    }

    fn get(host: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("host", host)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_domain_serves_landing_page() {
        let state = test_state(Duration::from_secs(1));
        let response = app(state).oneshot(get("example.com", "/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_unknown_subdomain_returns_404() {
        let state = test_state(Duration::from_secs(1));
        let response = app(state)
            .oneshot(get("nobody-here.example.com", "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("nobody-here"));
    }

    #[tokio::test]
    async fn test_request_round_trips_through_agent() {
        let state = test_state(Duration::from_secs(5));
        spawn_agent(&state, "e2e", |request| {
            assert_eq!(request.method, "GET");
            assert_eq!(request.pathname, "/hello?x=1");
            let mut response = TunnelResponse::new(request.id, 200);
            response
                .headers
                .insert("content-type".to_string(), "text/plain".to_string());
            response
                .headers
                .insert("content-encoding".to_string(), "gzip".to_string());
            response.body = encode_body(b"hello");
            response
        });

        let response = app(state.clone())
            .oneshot(get("e2e.example.com", "/hello?x=1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-encoding").is_none());
        assert_eq!(response.headers()["content-length"], "5");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
        assert!(state.pending.is_empty());
    }

    #[tokio::test]
    async fn test_post_body_is_forwarded() {
        let state = test_state(Duration::from_secs(5));
        spawn_agent(&state, "echo", |request| {
            let body = decode_body(&request.body).unwrap();
            let mut response = TunnelResponse::new(request.id, 201);
            response.body = encode_body(&body);
            response
        });

        let request = Request::builder()
            .method("POST")
            .uri("/items")
            .header("host", "echo.example.com")
            .body(Body::from("payload"))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_agent_times_out_with_504() {
        let state = test_state(Duration::from_secs(30));
        let (tx, mut rx) = mpsc::channel::<String>(16);
        state.registry.register(Some("slow"), AgentHandle::new(tx));
        // Keep the channel open but never answer
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let started = tokio::time::Instant::now();
        let response = app(state.clone())
            .oneshot(get("slow.example.com", "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(31));
        assert!(state.pending.is_empty());
    }

    #[tokio::test]
    async fn test_closed_agent_channel_returns_502() {
        let state = test_state(Duration::from_secs(5));
        let (tx, rx) = mpsc::channel::<String>(1);
        state.registry.register(Some("gone"), AgentHandle::new(tx));
        drop(rx);

        let response = app(state.clone())
            .oneshot(get("gone.example.com", "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(state.pending.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_returns_413() {
        let state = test_state(Duration::from_secs(5));
        let (tx, _rx) = mpsc::channel::<String>(1);
        state.registry.register(Some("big"), AgentHandle::new(tx));

        let body = vec![b'x'; tunl_common::constants::MAX_BODY_SIZE_BYTES + 1];
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("host", "big.example.com")
            .body(Body::from(body))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
