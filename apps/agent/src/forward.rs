//! Forwarding of tunneled requests to the local server

use reqwest::{Client, Method, redirect};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tunl_common::validation::validate_path;
use tunl_common::{
    Result, TunnelError, TunnelRequest, TunnelResponse, decode_body, encode_body,
    flatten_headers, map_to_headers, strip_headers,
};

/// Request headers describing the public hop rather than the local one
///
/// `accept-encoding` is replaced by the client's own, limited to the codings
/// it can decode.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "transfer-encoding",
    "accept-encoding",
    "content-length",
];

/// HTTP client for the local server
///
/// Redirects are handed back to the public client untouched. Compressed
/// responses are decoded here, so the body relayed to the broker is always in
/// identity encoding.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .build()
        .map_err(|e| TunnelError::HttpError(e.to_string()))
}

/// Forward `request` to the local server and produce the tunnel response
///
/// Never fails: anything that goes wrong becomes a `502 Bad Gateway` naming
/// the local target, carrying the request's id.
pub async fn forward_request(
    client: &Client,
    local_address: &str,
    request: TunnelRequest,
) -> TunnelResponse {
    let id = request.id.clone();
    let start_time = Instant::now();

    match send_to_local(client, local_address, request).await {
        Ok(response) => {
            let elapsed = start_time.elapsed().as_millis();
            if response.is_server_error() {
                warn!("{} -> {} from local server ({}ms)", id, response.status, elapsed);
            } else {
                debug!("{} -> {} ({}ms)", id, response.status, elapsed);
            }
            response
        }
        Err(e) => {
            warn!("Local server error for {}: {}", id, e);
            TunnelResponse::text(
                id,
                502,
                &format!("Bad Gateway: could not reach {} ({})", local_address, e),
            )
        }
    }
}

async fn send_to_local(
    client: &Client,
    local_address: &str,
    mut request: TunnelRequest,
) -> Result<TunnelResponse> {
    let path = validate_path(&request.pathname)
        .map_err(|e| TunnelError::InvalidMessage(e.to_string()))?;
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|_| TunnelError::InvalidMessage(format!("Invalid method: {}", request.method)))?;
    let url = format!("{}{}", local_address, path);

    debug!("Forwarding: {} {}", method, url);

    let mut headers = std::mem::take(&mut request.headers);
    strip_headers(&mut headers, STRIPPED_REQUEST_HEADERS);

    let mut builder = client.request(method, &url).headers(map_to_headers(&headers));

    if request.method_allows_body() && request.has_body() {
        builder = builder.body(decode_body(&request.body)?);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| TunnelError::LocalServiceUnavailable(e.to_string()))?;

    let status = response.status();
    let headers = flatten_headers(response.headers());
    let body = response
        .bytes()
        .await
        .map_err(|e| TunnelError::HttpError(e.to_string()))?;

    Ok(TunnelResponse {
        id: request.id,
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body: encode_body(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Redirect};
    use axum::routing::{any, get};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tokio::net::TcpListener;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn echo(method: axum::http::Method, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
        let host = headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::OK,
            [("x-method", method.to_string()), ("x-seen-host", host)],
            body,
        )
    }

    async fn spawn_origin() -> String {
        let app = Router::new()
            .route("/echo", any(echo))
            .route("/moved", get(|| async { Redirect::temporary("/elsewhere") }))
            .route(
                "/teapot",
                get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
            )
            // Compresses whatever the request asked for
            .route(
                "/gzipped",
                get(|| async {
                    (
                        [("content-encoding", "gzip"), ("content-type", "text/plain")],
                        gzip(b"hello"),
                    )
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> Client {
        build_client(Duration::from_secs(5)).unwrap()
    }

    fn request(method: &str, pathname: &str) -> TunnelRequest {
        TunnelRequest::new(
            "6f1c2d3e-0000-4000-8000-000000000001".to_string(),
            method.to_string(),
            pathname.to_string(),
        )
    }

    #[tokio::test]
    async fn test_post_body_reaches_origin() {
        let origin = spawn_origin().await;
        let mut req = request("POST", "/echo");
        req.body = encode_body(b"{\"a\":1}");
        req.headers
            .insert("host".to_string(), "bold-calm-fox.example.com".to_string());

        let response = forward_request(&client(), &origin, req).await;

        assert_eq!(response.id, "6f1c2d3e-0000-4000-8000-000000000001");
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.headers["x-method"], "POST");
        assert_ne!(response.headers["x-seen-host"], "bold-calm-fox.example.com");
        assert_eq!(decode_body(&response.body).unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_get_body_is_not_sent() {
        let origin = spawn_origin().await;
        let mut req = request("GET", "/echo");
        req.body = encode_body(b"ignored");

        let response = forward_request(&client(), &origin, req).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.headers["x-method"], "GET");
        assert!(decode_body(&response.body).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_is_passed_through() {
        let origin = spawn_origin().await;
        let response = forward_request(&client(), &origin, request("GET", "/teapot")).await;

        assert_eq!(response.status, 418);
        assert_eq!(decode_body(&response.body).unwrap(), b"short and stout");
    }

    #[tokio::test]
    async fn test_compressed_response_is_decoded() {
        let origin = spawn_origin().await;
        let mut req = request("GET", "/gzipped");
        req.headers
            .insert("accept-encoding".to_string(), "zstd".to_string());

        let response = forward_request(&client(), &origin, req).await;

        assert_eq!(response.status, 200);
        assert!(!response.headers.contains_key("content-encoding"));
        assert!(!response.headers.contains_key("content-length"));
        assert_eq!(response.headers["content-type"], "text/plain");
        assert_eq!(decode_body(&response.body).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let origin = spawn_origin().await;
        let response = forward_request(&client(), &origin, request("GET", "/moved")).await;

        assert_eq!(response.status, 307);
        assert_eq!(response.headers["location"], "/elsewhere");
    }

    #[tokio::test]
    async fn test_unreachable_origin_yields_502() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let response = forward_request(&client(), &origin, request("GET", "/")).await;

        assert_eq!(response.id, "6f1c2d3e-0000-4000-8000-000000000001");
        assert_eq!(response.status, 502);
        assert_eq!(response.headers["content-type"], "text/plain; charset=utf-8");
        let body = String::from_utf8(decode_body(&response.body).unwrap()).unwrap();
        assert!(body.contains(&origin));
    }

    #[tokio::test]
    async fn test_invalid_body_encoding_yields_502() {
        let origin = spawn_origin().await;
        let mut req = request("POST", "/echo");
        req.body = "not base64!!".to_string();

        let response = forward_request(&client(), &origin, req).await;
        assert_eq!(response.status, 502);
    }
}
