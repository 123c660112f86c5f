//! HTTP inbound adapter exposing the JSON API under `/api/v1`.

pub mod auth;
pub mod error;
pub mod health;
pub mod polls;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod users;
mod validation;

use actix_web::web;

pub use error::ApiResult;

/// Register every `/api/v1` handler plus the JSON and path extractor
/// configs that render failures in the shared error envelope.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use livepoll::inbound::http::api_services;
///
/// let _app = App::new().service(web::scope("/api/v1").configure(api_services));
/// ```
pub fn api_services(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::PathConfig::default().error_handler(error::path_error_handler))
        .service(auth::register)
        .service(auth::login)
        .service(auth::logout)
        .service(auth::profile)
        .service(users::create_user)
        .service(users::list_users)
        .service(users::get_user)
        .service(users::update_user)
        .service(users::delete_user)
        .service(polls::create_poll)
        .service(polls::list_polls)
        .service(polls::get_poll)
        .service(polls::update_poll)
        .service(polls::delete_poll)
        .service(polls::cast_vote);
}
