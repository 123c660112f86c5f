//! Poll and vote handlers.
//!
//! ```text
//! POST   /api/v1/polls                            {"title","options":[..]}
//! GET    /api/v1/polls
//! GET    /api/v1/polls/{id}
//! PUT    /api/v1/polls/{id}                       {"title","isOpen","options"?}
//! DELETE /api/v1/polls/{id}
//! POST   /api/v1/polls/{poll_id}/vote/{option_id}
//! ```
//!
//! Poll bodies are always rendered for the signed-in caller: `selectedOption`
//! and `voted` reflect that caller's ballot.

use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{
    Ballot, NewPoll, OptionId, Poll, PollId, PollOption, PollUpdate, PollView, VoteUpdate,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::invalid_field;

/// Body for `POST /polls`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub title: String,
    pub options: Vec<String>,
}

/// Body for `PUT /polls/{id}`. `options`, when present, replaces the list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollRequest {
    pub title: String,
    pub is_open: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// One option of a rendered poll.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OptionBody {
    /// Option identifier, used in vote URLs.
    pub id: OptionId,
    /// Display text.
    pub text: String,
    /// Committed votes for this option.
    pub votes_count: u32,
}

impl From<PollOption> for OptionBody {
    fn from(option: PollOption) -> Self {
        Self {
            id: option.id,
            text: option.text.into(),
            votes_count: option.votes_count,
        }
    }
}

/// A poll as rendered for one caller.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollBody {
    pub id: PollId,
    pub title: String,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub options: Vec<OptionBody>,
    pub selected_option: Option<OptionId>,
    pub voted: bool,
}

impl PollBody {
    fn new(poll: Poll, selected_option: Option<OptionId>) -> Self {
        Self {
            id: poll.id,
            title: poll.title.into(),
            is_open: poll.is_open,
            created_at: poll.created_at,
            options: poll.options.into_iter().map(OptionBody::from).collect(),
            selected_option,
            voted: selected_option.is_some(),
        }
    }
}

impl From<PollView> for PollBody {
    fn from(view: PollView) -> Self {
        Self::new(view.poll, view.selected_option)
    }
}

/// Result of a successful vote; the same shape is broadcast to live feeds.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub new_count: u32,
}

impl From<VoteUpdate> for VoteBody {
    fn from(update: VoteUpdate) -> Self {
        Self {
            poll_id: update.poll_id,
            option_id: update.option_id,
            new_count: update.new_count,
        }
    }
}

/// Create an open poll with zeroed counters; responds `201 Created`.
#[post("/polls")]
pub async fn create_poll(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreatePollRequest>,
) -> ApiResult<HttpResponse> {
    session.require_user_id()?;
    let new_poll = NewPoll::try_from_parts(&payload.title, payload.options.as_slice())
        .map_err(invalid_field)?;
    let poll = state.polls.create_poll(new_poll).await?;
    Ok(HttpResponse::Created().json(PollBody::new(poll, None)))
}

/// Every poll, newest first.
#[get("/polls")]
pub async fn list_polls(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<PollBody>>> {
    let viewer = session.require_user_id()?;
    let views = state.polls_query.list_polls(&viewer).await?;
    Ok(web::Json(views.into_iter().map(PollBody::from).collect()))
}

/// One poll with the caller's selection, or `404` when it does not exist.
#[get("/polls/{id}")]
pub async fn get_poll(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<PollId>,
) -> ApiResult<web::Json<PollBody>> {
    let viewer = session.require_user_id()?;
    let view = state.polls_query.get_poll(&path, &viewer).await?;
    Ok(web::Json(view.into()))
}

/// Retitle, open/close or (while no votes exist) replace the options.
#[put("/polls/{id}")]
pub async fn update_poll(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<PollId>,
    payload: web::Json<UpdatePollRequest>,
) -> ApiResult<web::Json<PollBody>> {
    let viewer = session.require_user_id()?;
    let UpdatePollRequest {
        title,
        is_open,
        options,
    } = payload.into_inner();
    let update =
        PollUpdate::try_from_parts(&title, is_open, options.as_deref()).map_err(invalid_field)?;
    let poll_id = path.into_inner();
    state.polls.update_poll(&poll_id, update).await?;
    // Re-read so the caller's selection is reported alongside the new state.
    let view = state.polls_query.get_poll(&poll_id, &viewer).await?;
    Ok(web::Json(view.into()))
}

/// Delete a poll together with its options and votes; responds `204`.
#[delete("/polls/{id}")]
pub async fn delete_poll(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<PollId>,
) -> ApiResult<HttpResponse> {
    session.require_user_id()?;
    state.polls.delete_poll(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Cast the caller's single vote, then fan the new count out to live feeds.
///
/// The vote is already committed when publishing runs, so a hub failure is
/// logged and the request still succeeds.
#[post("/polls/{poll_id}/vote/{option_id}")]
pub async fn cast_vote(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<(PollId, OptionId)>,
) -> ApiResult<web::Json<VoteBody>> {
    let user_id = session.require_user_id()?;
    let (poll_id, option_id) = path.into_inner();
    let ballot = Ballot {
        poll_id,
        option_id,
        user_id,
    };
    let update = state.votes.cast_vote(&ballot).await?;
    if let Err(error) = state.vote_events.publish(update).await {
        warn!(%error, %poll_id, %option_id, "vote recorded but not broadcast");
    }
    Ok(web::Json(update.into()))
}

#[cfg(test)]
#[path = "polls_tests.rs"]
mod tests;
