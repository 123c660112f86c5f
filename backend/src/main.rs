//! Server entry-point: loads configuration, connects persistence and serves
//! the JSON API, health probes and the live vote WebSocket.

mod server;

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use livepoll::inbound::http::health::HealthState;
use livepoll::inbound::http::session_config::{BuildMode, session_settings_from_env};
use livepoll::outbound::persistence::DbPool;
use livepoll::settings::AppSettings;
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|e| eyre!("failed to load settings: {e}"))?;
    let session = session_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
        .wrap_err("invalid session configuration")?;
    info!(fingerprint = %session.fingerprint, "session key loaded");

    let bind_addr = settings.bind_addr()?;
    let mut config = ServerConfig::new(session, bind_addr)
        .with_hub_queue_capacity(settings.hub_queue_capacity)
        .with_ws_allowed_origin_host(settings.ws_allowed_origin_host());
    if let Some(pool_config) = settings.pool_config() {
        info!(database = %pool_config.redacted_url(), "connecting to database");
        let pool = DbPool::new(pool_config)
            .await
            .wrap_err("failed to build database pool")?;
        config = config.with_db_pool(pool);
    }

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)
        .wrap_err_with(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "server listening");
    server.await.wrap_err("server terminated with an error")
}
