use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::encode_body;

/// The local service's answer, sent back through the tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelResponse {
    /// Must match the id of the corresponding request
    pub id: String,

    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,

    /// Reason phrase reported by the origin
    #[serde(default)]
    pub status_text: String,

    /// Flattened response headers, one value per name
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body encoded in Base64
    #[serde(default)]
    pub body: String,
}

impl TunnelResponse {
    /// Create a new response with the canonical reason phrase for `status`
    pub fn new(id: String, status: u16) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            id,
            status,
            status_text,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// A plain-text response, used for errors synthesized inside the tunnel
    pub fn text(id: String, status: u16, message: &str) -> Self {
        let mut response = Self::new(id, status);
        response.headers.insert(
            "content-type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );
        response.body = encode_body(message.as_bytes());
        response
    }

    /// Check if the response has a body
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Check if the response is a server error (5xx status code)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}
