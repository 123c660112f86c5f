//! Shared state for WebSocket handlers.

use std::sync::Arc;

use crate::domain::ports::VoteFeed;

/// Dependencies injected into the WebSocket upgrade handler.
#[derive(Clone)]
pub struct WsState {
    pub feed: Arc<dyn VoteFeed>,
    allowed_origin_host: Arc<str>,
}

impl WsState {
    /// Build state over the vote feed. `allowed_origin_host` is the HTTPS host
    /// (and parent of allowed subdomains) that may open connections.
    pub fn new(feed: Arc<dyn VoteFeed>, allowed_origin_host: impl Into<Arc<str>>) -> Self {
        Self {
            feed,
            allowed_origin_host: allowed_origin_host.into(),
        }
    }

    /// Host accepted over HTTPS, together with its subdomains.
    pub fn allowed_origin_host(&self) -> &str {
        &self.allowed_origin_host
    }
}
