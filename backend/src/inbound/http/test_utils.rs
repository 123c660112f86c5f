//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_http::Request;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpResponse, test, web};

use super::api_services;
use super::session::SessionContext;
use super::state::HttpState;
use crate::domain::UserId;
use crate::domain::ports::{
    MockAccountsCommand, MockLoginService, MockPollsCommand, MockPollsQuery, MockUsersQuery,
    MockVoteCommand, MockVoteEventPublisher,
};

/// Session middleware for tests: fresh key per call, cookie named
/// `session`, `Secure` disabled for plain-HTTP test requests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// The `session` cookie set by `response`.
pub fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

/// Mocked ports for handler tests; set expectations, then call
/// [`MockPorts::into_state`].
#[derive(Default)]
pub struct MockPorts {
    pub login: MockLoginService,
    pub accounts: MockAccountsCommand,
    pub users: MockUsersQuery,
    pub polls: MockPollsCommand,
    pub polls_query: MockPollsQuery,
    pub votes: MockVoteCommand,
    pub vote_events: MockVoteEventPublisher,
}

impl MockPorts {
    pub fn into_state(self) -> web::Data<HttpState> {
        web::Data::new(HttpState {
            login: Arc::new(self.login),
            accounts: Arc::new(self.accounts),
            users: Arc::new(self.users),
            polls: Arc::new(self.polls),
            polls_query: Arc::new(self.polls_query),
            votes: Arc::new(self.votes),
            vote_events: Arc::new(self.vote_events),
        })
    }
}

/// App with the full `/api/v1` surface over `state`, plus a `/test/login/{id}`
/// route that signs a fixed user in without touching the login port.
pub fn test_app(
    state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new().app_data(state).service(
        web::scope("/api/v1")
            .wrap(test_session_middleware())
            .configure(api_services)
            .route(
                "/test/login/{id}",
                web::post().to(|session: SessionContext, id: web::Path<String>| async move {
                    let user_id = UserId::new(id.as_str()).map_err(|_| {
                        crate::domain::Error::invalid_request("fixture user id must be a UUID")
                    })?;
                    session.persist_user(&user_id)?;
                    Ok::<_, crate::domain::Error>(HttpResponse::Ok().finish())
                }),
            ),
    )
}

/// Sign `user` in through the fixture route and return the session cookie.
pub async fn signed_in<S>(app: &S, user: &UserId) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let res = test::call_service(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/test/login/{user}"))
            .to_request(),
    )
    .await;
    assert!(res.status().is_success(), "fixture login failed");
    session_cookie(&res)
}
