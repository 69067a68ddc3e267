mod message;
mod request;
mod response;

pub use message::Message;
pub use request::TunnelRequest;
pub use response::TunnelResponse;
