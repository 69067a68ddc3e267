//! Pending requests tracker
//!
//! Pairs each forwarded public request with the agent's eventual response by
//! correlation id. An entry is removed exactly once: by the matching response,
//! by its deadline, or by the waiter going away, whichever comes first.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use tunl_common::TunnelResponse;

type Waiters = DashMap<String, oneshot::Sender<TunnelResponse>>;

/// Tracks forwarded requests awaiting responses
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    requests: Arc<Waiters>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending entry for `id`
    ///
    /// Call this before sending the request to the agent so that even an
    /// immediate answer finds its entry.
    pub fn register(&self, id: &str) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        self.requests.insert(id.to_string(), tx);
        debug!("Registered pending request {}", id);

        PendingResponse {
            id: id.to_string(),
            rx,
            requests: self.requests.clone(),
        }
    }

    /// Complete the pending entry for `id` with `response`
    ///
    /// Returns false, and does nothing else, when no entry exists (already
    /// resolved, timed out, or never issued).
    pub fn resolve(&self, id: &str, response: TunnelResponse) -> bool {
        let Some((_, tx)) = self.requests.remove(id) else {
            debug!("No pending request for {}, dropping response", id);
            return false;
        };

        if tx.send(response).is_err() {
            debug!("Waiter for {} is gone", id);
            return false;
        }
        true
    }

    /// Number of requests awaiting a response
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// The waiting side of one pending entry
///
/// Dropping it removes the entry, so an abandoned public request does not
/// linger until its deadline.
#[derive(Debug)]
pub struct PendingResponse {
    id: String,
    rx: oneshot::Receiver<TunnelResponse>,
    requests: Arc<Waiters>,
}

impl PendingResponse {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the agent's response, or synthesize a 504 once `deadline` elapses
    pub async fn wait(mut self, deadline: Duration) -> TunnelResponse {
        match tokio::time::timeout(deadline, &mut self.rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                warn!("Pending request {} was dropped without a response", self.id);
                TunnelResponse::text(
                    self.id.clone(),
                    502,
                    "Bad Gateway: tunnel closed before responding",
                )
            }
            Err(_) => {
                warn!("Request {} timed out after {:?}", self.id, deadline);
                TunnelResponse::text(
                    self.id.clone(),
                    504,
                    "Gateway Timeout: no response from agent",
                )
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if self.requests.remove(&self.id).is_some() {
            debug!("Removed pending request {}", self.id);
        }
    }
}
