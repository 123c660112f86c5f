//! Full application wiring over the in-memory store.
//!
//! Integration tests under `backend/tests/` compile as separate crates; this
//! helper mirrors the server's composition so every test exercises the same
//! middleware stack.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use argon2::Params;
use mockable::DefaultClock;

use livepoll::Trace;
use livepoll::domain::{AccountService, PollService, VoteHub};
use livepoll::inbound::http::api_services;
use livepoll::inbound::http::health::{HealthState, live, ready};
use livepoll::inbound::http::state::HttpState;
use livepoll::inbound::ws;
use livepoll::inbound::ws::state::WsState;
use livepoll::outbound::memory::InMemoryStore;
use livepoll::outbound::password::Argon2PasswordHasher;

/// HTTPS host accepted by the WebSocket origin check.
pub const ALLOWED_ORIGIN_HOST: &str = "polls.example";

/// Shared adapter state for one test application.
#[derive(Clone)]
pub struct TestStack {
    pub hub: VoteHub,
    http: web::Data<HttpState>,
    ws: web::Data<WsState>,
    health: web::Data<HealthState>,
    key: Key,
}

impl TestStack {
    /// Wire services over a fresh in-memory store. Must run inside a Tokio
    /// runtime.
    pub fn in_memory(queue_capacity: usize) -> Self {
        let hub = VoteHub::spawn(queue_capacity);
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(DefaultClock);
        let params = Params::new(Params::MIN_M_COST, 1, 1, None).expect("cheap argon2 params");
        let polls = Arc::new(PollService::new(store.clone(), clock.clone()));
        let accounts = Arc::new(AccountService::new(
            store,
            Arc::new(Argon2PasswordHasher::with_params(params)),
            clock,
        ));
        let feed = Arc::new(hub.clone());
        let http = HttpState {
            login: accounts.clone(),
            accounts: accounts.clone(),
            users: accounts,
            polls: polls.clone(),
            polls_query: polls.clone(),
            votes: polls,
            vote_events: feed.clone(),
        };
        let health = HealthState::new();
        health.mark_ready();
        Self {
            hub,
            http: web::Data::new(http),
            ws: web::Data::new(WsState::new(feed, ALLOWED_ORIGIN_HOST)),
            health: web::Data::new(health),
            key: Key::generate(),
        }
    }

    /// The application as the server composes it, with insecure cookies so
    /// plain-HTTP clients keep their session.
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        let session = SessionMiddleware::builder(CookieSessionStore::default(), self.key.clone())
            .cookie_name("session".to_owned())
            .cookie_secure(false)
            .build();

        App::new()
            .app_data(self.health.clone())
            .app_data(self.http.clone())
            .app_data(self.ws.clone())
            .wrap(Trace)
            .service(web::scope("/api/v1").wrap(session).configure(api_services))
            .service(ws::ws_entry)
            .service(ready)
            .service(live)
    }
}

/// The `session` cookie set by a response, if any.
pub fn session_cookie<'a>(cookies: impl IntoIterator<Item = Cookie<'a>>) -> Option<Cookie<'static>> {
    cookies
        .into_iter()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
}
