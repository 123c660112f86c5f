//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use actix_web::cookie::{Key, SameSite};
use livepoll::domain::broadcast::DEFAULT_QUEUE_CAPACITY;
use livepoll::inbound::http::session_config::SessionSettings;
use livepoll::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) hub_queue_capacity: usize,
    pub(crate) ws_allowed_origin_host: String,
}

impl ServerConfig {
    /// Construct a configuration from validated session settings.
    #[must_use]
    pub fn new(session: SessionSettings, bind_addr: SocketAddr) -> Self {
        let SessionSettings {
            key,
            cookie_secure,
            same_site,
            fingerprint: _,
        } = session;
        Self {
            key,
            cookie_secure,
            same_site,
            bind_addr,
            db_pool: None,
            hub_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ws_allowed_origin_host: "localhost".to_owned(),
        }
    }

    /// Attach a database connection pool. Without one the server keeps all
    /// state in memory.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Set the per-subscriber queue length of the vote hub.
    #[must_use]
    pub fn with_hub_queue_capacity(mut self, capacity: usize) -> Self {
        self.hub_queue_capacity = capacity;
        self
    }

    /// Set the HTTPS host allowed to open WebSocket connections.
    #[must_use]
    pub fn with_ws_allowed_origin_host(mut self, host: impl Into<String>) -> Self {
        self.ws_allowed_origin_host = host.into();
        self
    }
}
