//! tunl agent
//!
//! Connects out to a broker over a WebSocket, receives public requests as
//! protocol messages and replays them against a local HTTP server.

pub mod browser;
pub mod config;
pub mod forward;
pub mod relay;

pub use config::{Args, Config};
pub use relay::Tunnel;
