//! ResponseHandler - messages arriving from agents
//!
//! Only well-formed `response` messages carrying a broker-issued id are acted
//! upon; anything else is logged and dropped without touching the connection.

use tracing::debug;
use tunl_common::Message;
use tunl_common::validation::validate_request_id;

use crate::pending::PendingRequests;

/// Handle one text frame from the agent serving `subdomain`
pub fn handle_agent_message(pending: &PendingRequests, subdomain: &str, text: &str) {
    let response = match Message::from_json(text) {
        Ok(Message::Response(response)) => response,
        Ok(other) => {
            debug!("Ignoring unexpected message from {}: {:?}", subdomain, other);
            return;
        }
        Err(e) => {
            debug!("Ignoring malformed message from {}: {}", subdomain, e);
            return;
        }
    };

    if let Err(e) = validate_request_id(&response.id) {
        debug!("Ignoring response from {}: {}", subdomain, e);
        return;
    }

    let id = response.id.clone();
    let status = response.status;
    if pending.resolve(&id, response) {
        debug!("Resolved {} with status {} from {}", id, status, subdomain);
    } else {
        debug!("Late or unknown response {} from {}", id, subdomain);
    }
}
