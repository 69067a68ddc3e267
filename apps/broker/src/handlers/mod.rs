//! Handler modules
//!
//! Every public request enters through [`handle_request`], which splits it into
//! the registration branch (`/?new`, upgraded to the agent WebSocket) and the
//! proxy branch (routed to an agent by subdomain).

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, Request, State};
use axum::response::Response;
use serde::Deserialize;

use crate::AppState;

pub mod connect;
pub mod disconnect;
pub mod forwarding;
pub mod response;

pub use connect::handle_connect;
pub use disconnect::handle_disconnect;
pub use forwarding::handle_forwarding;
pub use response::handle_agent_message;

/// Query parameters of a registration request: `/?new[&subdomain=<name>]`
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationParams {
    pub new: Option<String>,
    pub subdomain: Option<String>,
}

impl RegistrationParams {
    pub fn is_registration(&self) -> bool {
        self.new.is_some()
    }
}

/// Entry point for every request the broker receives
pub async fn handle_request(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
) -> Response {
    let params = Query::<RegistrationParams>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    if params.is_registration() {
        return handle_connect(state, ws, params.subdomain);
    }

    handle_forwarding(state, request).await
}
