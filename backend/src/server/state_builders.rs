//! Builders wiring repositories, domain services and the vote hub into the
//! inbound adapter states.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::info;

use livepoll::domain::ports::{PollRepository, UserRepository};
use livepoll::domain::{AccountService, PollService, VoteHub};
use livepoll::inbound::http::state::HttpState;
use livepoll::inbound::ws::state::WsState;
use livepoll::outbound::memory::InMemoryStore;
use livepoll::outbound::password::Argon2PasswordHasher;
use livepoll::outbound::persistence::{DieselPollRepository, DieselUserRepository};

use super::ServerConfig;

/// Adapter states shared by every worker.
#[derive(Clone)]
pub(crate) struct AdapterStates {
    pub(crate) http: web::Data<HttpState>,
    pub(crate) ws: web::Data<WsState>,
}

/// Build adapter states over PostgreSQL when a pool is configured, otherwise
/// over a process-local store. Must run inside a Tokio runtime because the
/// vote hub spawns its coordinator task.
pub(crate) fn build_adapter_states(config: &ServerConfig) -> AdapterStates {
    let hub = VoteHub::spawn(config.hub_queue_capacity);
    match &config.db_pool {
        Some(pool) => {
            info!("using PostgreSQL persistence");
            wire(
                Arc::new(DieselPollRepository::new(pool.clone())),
                Arc::new(DieselUserRepository::new(pool.clone())),
                hub,
                &config.ws_allowed_origin_host,
            )
        }
        None => {
            info!("no database configured; using in-memory persistence");
            let store = Arc::new(InMemoryStore::new());
            wire(
                store.clone(),
                store,
                hub,
                &config.ws_allowed_origin_host,
            )
        }
    }
}

fn wire<P, U>(
    poll_repo: Arc<P>,
    user_repo: Arc<U>,
    hub: VoteHub,
    ws_allowed_origin_host: &str,
) -> AdapterStates
where
    P: PollRepository + 'static,
    U: UserRepository + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let polls = Arc::new(PollService::new(poll_repo, clock.clone()));
    let accounts = Arc::new(AccountService::new(
        user_repo,
        Arc::new(Argon2PasswordHasher::default()),
        clock,
    ));
    let hub = Arc::new(hub);

    let http = HttpState {
        login: accounts.clone(),
        accounts: accounts.clone(),
        users: accounts,
        polls: polls.clone(),
        polls_query: polls.clone(),
        votes: polls,
        vote_events: hub.clone(),
    };
    AdapterStates {
        http: web::Data::new(http),
        ws: web::Data::new(WsState::new(hub, ws_allowed_origin_host)),
    }
}
