//! DisconnectHandler - agent socket closed
//!
//! Requests still pending for the agent are not failed early; they run into
//! their own deadline.

use tracing::{debug, info};

use crate::AppState;

/// Remove the agent's registry entry
pub fn handle_disconnect(state: &AppState, subdomain: &str, connection_id: &str) {
    if state.registry.unregister(subdomain, connection_id) {
        info!("- {} ({} connected)", subdomain, state.registry.len());
    } else {
        debug!("{} was already unregistered", subdomain);
    }
}
