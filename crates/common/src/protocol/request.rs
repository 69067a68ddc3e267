use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An HTTP request forwarded from the public endpoint to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelRequest {
    /// Correlation id, echoed back in the matching response
    pub id: String,

    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: String,

    /// Request path including the query string
    /// Example: "/api/v1/users?limit=10"
    pub pathname: String,

    /// Flattened request headers, one value per name
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request body encoded in Base64, empty when there is none
    #[serde(default)]
    pub body: String,
}

impl TunnelRequest {
    /// Create a new request without headers or body
    pub fn new(id: String, method: String, pathname: String) -> Self {
        Self {
            id,
            method,
            pathname,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Check if the request has a body
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Whether the method may carry a body at all
    pub fn method_allows_body(&self) -> bool {
        !matches!(
            self.method.to_ascii_uppercase().as_str(),
            "GET" | "HEAD"
        )
    }
}
