//! User administration handlers. Every route requires a signed-in caller.
//!
//! ```text
//! POST   /api/v1/users       {"email","name","password","active"?}
//! GET    /api/v1/users
//! GET    /api/v1/users/{id}
//! PUT    /api/v1/users/{id}  {"email"?,"name"?,"password"?,"active"?}
//! DELETE /api/v1/users/{id}
//! ```

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::domain::{
    AccountChanges, EmailAddress, Error, NewAccount, User, UserId, UserName, UserValidationError,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::invalid_field;

/// Body for `POST /users`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Body for `PUT /users/{id}`; absent fields stay unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub active: Option<bool>,
}

impl TryFrom<UpdateUserRequest> for AccountChanges {
    type Error = UserValidationError;

    fn try_from(value: UpdateUserRequest) -> Result<Self, Self::Error> {
        let password = match value.password {
            Some(password) if password.is_empty() => {
                return Err(UserValidationError::EmptyPassword);
            }
            other => other.map(Zeroizing::new),
        };
        Ok(Self {
            email: value.email.map(EmailAddress::new).transpose()?,
            name: value.name.map(UserName::new).transpose()?,
            password,
            active: value.active,
        })
    }
}

fn user_id(raw: &str) -> ApiResult<UserId> {
    UserId::new(raw).map_err(|_| Error::not_found(format!("user {raw} not found")))
}

#[post("/users")]
pub async fn create_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreateUserRequest>,
) -> ApiResult<HttpResponse> {
    session.require_user_id()?;
    let CreateUserRequest {
        email,
        name,
        password,
        active,
    } = payload.into_inner();
    let account =
        NewAccount::try_from_parts(&email, &name, &password, active).map_err(invalid_field)?;
    let user = state.accounts.create_user(account).await?;
    Ok(HttpResponse::Created().json(user))
}

/// All accounts, oldest first.
#[get("/users")]
pub async fn list_users(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<User>>> {
    session.require_user_id()?;
    Ok(web::Json(state.users.list_users().await?))
}

#[get("/users/{id}")]
pub async fn get_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<User>> {
    session.require_user_id()?;
    let id = user_id(&path)?;
    Ok(web::Json(state.users.get_user(&id).await?))
}

#[put("/users/{id}")]
pub async fn update_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<web::Json<User>> {
    session.require_user_id()?;
    let id = user_id(&path)?;
    let changes = AccountChanges::try_from(payload.into_inner()).map_err(invalid_field)?;
    Ok(web::Json(state.accounts.update_user(&id, changes).await?))
}

/// Remove an account. Accounts that have voted answer `409`.
#[delete("/users/{id}")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    session.require_user_id()?;
    let id = user_id(&path)?;
    state.accounts.delete_user(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}
