//! End-to-end HTTP flows over the in-memory store: accounts, poll
//! administration and vote casting with the live feed behind it.

#[path = "support/app.rs"]
mod app_support;

use actix_http::Request;
use actix_web::body::BoxBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use app_support::{TestStack, session_cookie};
use livepoll::domain::OptionId;
use livepoll::inbound::http::polls::{PollBody, VoteBody};
use rstest::rstest;
use serde_json::{Value, json};

async fn register(
    app: &impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
    email: &str,
) -> Cookie<'static> {
    let request = TestRequest::post()
        .uri("/api/v1/register")
        .set_json(json!({ "email": email, "name": "Voter", "password": "hunter22" }))
        .to_request();
    let response = test::call_service(app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED, "register {email}");
    session_cookie(response.response().cookies()).expect("session cookie")
}

async fn create_poll(
    app: &impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
    cookie: &Cookie<'static>,
    title: &str,
) -> PollBody {
    let request = TestRequest::post()
        .uri("/api/v1/polls")
        .cookie(cookie.clone())
        .set_json(json!({ "title": title, "options": ["Tea", "Coffee"] }))
        .to_request();
    let response = test::call_service(app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    test::read_body_json(response).await
}

fn vote_request(cookie: &Cookie<'static>, poll: &PollBody, option: OptionId) -> Request {
    TestRequest::post()
        .uri(&format!("/api/v1/polls/{}/vote/{option}", poll.id))
        .cookie(cookie.clone())
        .to_request()
}

#[rstest]
#[actix_web::test]
async fn vote_is_counted_once_and_broadcast() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;
    let mut feed = stack.hub.subscribe().await.expect("subscribe");
    let ada = register(&app, "ada@example.com").await;
    let poll = create_poll(&app, &ada, "Morning drink").await;
    let tea = poll.options[0].id;
    let coffee = poll.options[1].id;

    let response = test::call_service(&app, vote_request(&ada, &poll, tea)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let vote: VoteBody = test::read_body_json(response).await;
    assert_eq!(vote.new_count, 1);

    let event = feed.recv().await.expect("broadcast");
    assert_eq!((event.poll_id, event.option_id, event.new_count), (poll.id, tea, 1));

    let response = test::call_service(&app, vote_request(&ada, &poll, coffee)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["code"], "forbidden");

    let request = TestRequest::get()
        .uri(&format!("/api/v1/polls/{}", poll.id))
        .cookie(ada.clone())
        .to_request();
    let seen: PollBody = test::call_and_read_body_json(&app, request).await;
    assert_eq!(seen.selected_option, Some(tea));
    assert!(seen.voted);
    assert_eq!(seen.options[0].votes_count, 1);
    assert_eq!(seen.options[1].votes_count, 0);

    feed.unsubscribe().await;
    assert!(feed.recv().await.is_err(), "rejected vote must not broadcast");
}

#[rstest]
#[actix_web::test]
async fn vote_status_is_scoped_to_the_caller() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;
    let ada = register(&app, "ada@example.com").await;
    let grace = register(&app, "grace@example.com").await;
    let poll = create_poll(&app, &ada, "Lunch").await;

    let response = test::call_service(&app, vote_request(&grace, &poll, poll.options[1].id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let request = TestRequest::get()
        .uri("/api/v1/polls")
        .cookie(ada.clone())
        .to_request();
    let listed: Vec<PollBody> = test::call_and_read_body_json(&app, request).await;
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].voted);
    assert_eq!(listed[0].options[1].votes_count, 1);
}

#[rstest]
#[actix_web::test]
async fn deleted_accounts_cannot_vote_with_a_live_session() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;
    let ada = register(&app, "ada@example.com").await;
    let grace = register(&app, "grace@example.com").await;
    let poll = create_poll(&app, &ada, "Snacks").await;

    let request = TestRequest::get()
        .uri("/api/v1/profile")
        .cookie(grace.clone())
        .to_request();
    let profile: Value = test::call_and_read_body_json(&app, request).await;
    let grace_id = profile["id"].as_str().expect("user id").to_owned();
    let delete = TestRequest::delete()
        .uri(&format!("/api/v1/users/{grace_id}"))
        .cookie(ada.clone())
        .to_request();
    let response = test::call_service(&app, delete).await;
    assert!(response.status().is_success());

    let response = test::call_service(&app, vote_request(&grace, &poll, poll.options[0].id)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[rstest]
#[actix_web::test]
async fn closed_polls_and_locked_options_are_refused() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;
    let ada = register(&app, "ada@example.com").await;
    let grace = register(&app, "grace@example.com").await;
    let poll = create_poll(&app, &ada, "Weekend").await;

    let response = test::call_service(&app, vote_request(&ada, &poll, poll.options[0].id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let replace = TestRequest::put()
        .uri(&format!("/api/v1/polls/{}", poll.id))
        .cookie(ada.clone())
        .set_json(json!({ "title": "Weekend", "isOpen": true, "options": ["Hike", "Swim"] }))
        .to_request();
    let response = test::call_service(&app, replace).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let close = TestRequest::put()
        .uri(&format!("/api/v1/polls/{}", poll.id))
        .cookie(ada.clone())
        .set_json(json!({ "title": "Weekend plans", "isOpen": false }))
        .to_request();
    let closed: PollBody = test::call_and_read_body_json(&app, close).await;
    assert!(!closed.is_open);
    assert_eq!(closed.title, "Weekend plans");
    assert_eq!(closed.options[0].votes_count, 1);

    let response = test::call_service(&app, vote_request(&grace, &poll, poll.options[1].id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[rstest]
#[actix_web::test]
async fn deleting_a_poll_removes_it() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;
    let ada = register(&app, "ada@example.com").await;
    let poll = create_poll(&app, &ada, "Ephemeral").await;

    let delete = TestRequest::delete()
        .uri(&format!("/api/v1/polls/{}", poll.id))
        .cookie(ada.clone())
        .to_request();
    assert_eq!(
        test::call_service(&app, delete).await.status(),
        StatusCode::NO_CONTENT
    );

    let fetch = TestRequest::get()
        .uri(&format!("/api/v1/polls/{}", poll.id))
        .cookie(ada.clone())
        .to_request();
    assert_eq!(
        test::call_service(&app, fetch).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[rstest]
#[actix_web::test]
async fn login_logout_round_trip() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;
    register(&app, "ada@example.com").await;

    let bad = TestRequest::post()
        .uri("/api/v1/login")
        .set_json(json!({ "email": "ada@example.com", "password": "wrong" }))
        .to_request();
    let response = test::call_service(&app, bad).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("trace-id"));

    let good = TestRequest::post()
        .uri("/api/v1/login")
        .set_json(json!({ "email": "ADA@example.com", "password": "hunter22" }))
        .to_request();
    let response = test::call_service(&app, good).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(response.response().cookies()).expect("session cookie");

    let profile = TestRequest::get()
        .uri("/api/v1/profile")
        .cookie(cookie.clone())
        .to_request();
    let user: Value = test::call_and_read_body_json(&app, profile).await;
    assert_eq!(user["email"], "ada@example.com");

    let logout = TestRequest::post()
        .uri("/api/v1/logout")
        .cookie(cookie)
        .to_request();
    let response = test::call_service(&app, logout).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = session_cookie(response.response().cookies()).expect("removal cookie");
    assert!(cleared.value().is_empty());
}

#[rstest]
#[actix_web::test]
async fn health_probes_report_ready() {
    let stack = TestStack::in_memory(16);
    let app = test::init_service(stack.app()).await;

    for path in ["/health/ready", "/health/live"] {
        let response = test::call_service(&app, TestRequest::get().uri(path).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}
