//! Common utilities and types for tunl
//!
//! This crate provides the wire protocol and the helpers shared by the broker
//! (public listener and subdomain registry) and the agent (local relay).

pub mod constants;
pub mod error;
pub mod protocol;
pub mod utils;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::{Result, TunnelError};
pub use protocol::{Message, TunnelRequest, TunnelResponse};
pub use utils::{
    decode_body, encode_body, flatten_headers, generate_request_id, generate_subdomain,
    map_to_headers, strip_headers,
};
