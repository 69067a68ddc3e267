mod encoding;
mod headers;
mod id;

pub use encoding::{decode_body, encode_body};
pub use headers::{flatten_headers, map_to_headers, strip_headers};
pub use id::{generate_request_id, generate_subdomain};
