//! Registration, login and session handlers.
//!
//! ```text
//! POST /api/v1/register {"email":"ada@example.com","name":"Ada","password":"..."}
//! POST /api/v1/login    {"email":"ada@example.com","password":"..."}
//! POST /api/v1/logout
//! GET  /api/v1/profile
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use tracing::info;

use crate::domain::{LoginCredentials, NewAccount, User};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::invalid_field;

/// Body for `POST /register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Body for `POST /login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create an active account and sign it in.
#[post("/register")]
pub async fn register(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let RegisterRequest {
        email,
        name,
        password,
    } = payload.into_inner();
    let account =
        NewAccount::try_from_parts(&email, &name, &password, true).map_err(invalid_field)?;
    let user = state.accounts.register(account).await?;
    session.persist_user(user.id())?;
    Ok(HttpResponse::Created().json(user))
}

/// Check credentials and establish a session.
#[post("/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let credentials = LoginCredentials::try_from_parts(&payload.email, &payload.password)
        .map_err(invalid_field)?;
    let user_id = state.login.authenticate(&credentials).await?;
    session.persist_user(&user_id)?;
    info!(%user_id, "user logged in");
    Ok(HttpResponse::Ok().finish())
}

/// End the session. Always succeeds.
#[post("/logout")]
pub async fn logout(session: SessionContext) -> HttpResponse {
    session.clear();
    HttpResponse::NoContent().finish()
}

/// The signed-in caller's account.
#[get("/profile")]
pub async fn profile(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<User>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(state.users.profile(&user_id).await?))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
