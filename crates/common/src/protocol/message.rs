use serde::{Deserialize, Serialize};

use super::{TunnelRequest, TunnelResponse};
use crate::Result;

/// All WebSocket text frames carry one of these, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Broker -> agent, sent once right after the connection is accepted
    Init { url: String },

    /// Broker -> agent
    Request(TunnelRequest),

    /// Agent -> broker
    Response(TunnelResponse),
}

impl Message {
    /// Serialize into a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl From<TunnelRequest> for Message {
    fn from(request: TunnelRequest) -> Self {
        Message::Request(request)
    }
}

impl From<TunnelResponse> for Message {
    fn from(response: TunnelResponse) -> Self {
        Message::Response(response)
    }
}
