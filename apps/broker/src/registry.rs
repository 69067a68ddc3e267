//! Registry of connected agents, keyed by subdomain

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use tunl_common::validation::validate_subdomain;
use tunl_common::{Message, Result, TunnelError, generate_request_id, generate_subdomain};

/// Handle to one agent's WebSocket connection
///
/// Cloning is cheap; every clone feeds the same writer task.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    /// Identifies this particular socket, so a stale close cannot evict a newer entry
    pub connection_id: String,
    sender: mpsc::Sender<String>,
}

impl AgentHandle {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self {
            connection_id: generate_request_id(),
            sender,
        }
    }

    /// Queue a protocol message for the agent
    pub async fn send(&self, message: &Message) -> Result<()> {
        let json = message.to_json()?;
        self.sender
            .send(json)
            .await
            .map_err(|_| TunnelError::ConnectionError("agent connection closed".to_string()))
    }
}

/// Subdomain -> live agent connection
#[derive(Debug, Clone, Default)]
pub struct Registry {
    agents: Arc<DashMap<String, AgentHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to a subdomain and return the subdomain assigned
    ///
    /// The requested subdomain is used when it is a valid label with no live
    /// holder; otherwise random subdomains are drawn until a free one is found.
    /// A live entry is never replaced.
    pub fn register(&self, requested: Option<&str>, handle: AgentHandle) -> String {
        let mut candidate = match requested {
            Some(s) if validate_subdomain(s).is_ok() => s.to_string(),
            _ => generate_subdomain(),
        };

        loop {
            match self.agents.entry(candidate) {
                Entry::Vacant(entry) => {
                    let assigned = entry.key().clone();
                    entry.insert(handle);
                    return assigned;
                }
                Entry::Occupied(entry) => {
                    debug!("Subdomain {} is taken, drawing another", entry.key());
                }
            }
            candidate = generate_subdomain();
        }
    }

    /// Remove `subdomain` if it still belongs to `connection_id`
    ///
    /// Returns whether an entry was removed. Safe to call repeatedly.
    pub fn unregister(&self, subdomain: &str, connection_id: &str) -> bool {
        self.agents
            .remove_if(subdomain, |_, handle| handle.connection_id == connection_id)
            .is_some()
    }

    /// Find the agent serving `subdomain`
    pub fn lookup(&self, subdomain: &str) -> Option<AgentHandle> {
        self.agents.get(subdomain).map(|entry| entry.value().clone())
    }

    /// Number of connected agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
