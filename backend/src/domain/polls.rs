//! Poll domain service.
//!
//! `PollService` implements the poll and vote driving ports on top of a
//! [`PollRepository`], translating ledger and persistence failures into the
//! transport-neutral [`Error`].

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{error, info};

use crate::domain::ports::{
    PollPersistenceError, PollRepository, PollsCommand, PollsQuery, VoteCommand,
};
use crate::domain::{
    Ballot, Error, NewPoll, Poll, PollId, PollUpdate, PollView, PollWriteError, UserId,
    VoteError, VoteUpdate,
};

fn map_persistence_error(error: PollPersistenceError) -> Error {
    match error {
        PollPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("poll repository unavailable: {message}"))
        }
        PollPersistenceError::Query { message } => {
            Error::internal(format!("poll repository error: {message}"))
        }
        PollPersistenceError::DuplicateVote => Error::conflict("vote already recorded"),
        PollPersistenceError::UnknownOption => Error::not_found("option not found in poll"),
        PollPersistenceError::UnknownVoter => Error::unauthorized("account no longer exists"),
    }
}

fn map_write_error(id: &PollId, error: PollWriteError) -> Error {
    match error {
        PollWriteError::NotFound => Error::not_found(format!("poll {id} not found")),
        PollWriteError::OptionsLocked { votes } => {
            Error::conflict("options cannot be replaced after votes have been cast")
                .with_details(json!({ "field": "options", "votes": votes }))
        }
        PollWriteError::Storage(error) => map_persistence_error(error),
    }
}

fn map_vote_error(ballot: &Ballot, error: VoteError) -> Error {
    match error {
        VoteError::PollClosed => Error::forbidden("poll is closed"),
        VoteError::AlreadyVoted => Error::forbidden("you have already voted on this poll"),
        VoteError::UnknownOption => {
            Error::not_found(format!("option {} not found in poll", ballot.option_id))
        }
        VoteError::UnknownVoter => Error::unauthorized("account no longer exists"),
        VoteError::StorageFailure(cause) => {
            error!(
                poll_id = %ballot.poll_id,
                option_id = %ballot.option_id,
                error = %cause,
                "vote transaction failed"
            );
            Error::internal(format!("vote could not be recorded: {cause}"))
        }
    }
}

/// Poll service implementing the poll and vote driving ports.
#[derive(Clone)]
pub struct PollService<R> {
    poll_repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> PollService<R> {
    /// Create a new service over the poll repository.
    pub fn new(poll_repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { poll_repo, clock }
    }
}

#[async_trait]
impl<R> PollsCommand for PollService<R>
where
    R: PollRepository,
{
    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, Error> {
        let poll = Poll::open(poll, self.clock.utc());
        self.poll_repo
            .create_poll(&poll)
            .await
            .map_err(|err| map_write_error(&poll.id, err))?;
        info!(poll_id = %poll.id, options = poll.options.len(), "poll created");
        Ok(poll)
    }

    async fn update_poll(&self, id: &PollId, update: PollUpdate) -> Result<Poll, Error> {
        let poll = self
            .poll_repo
            .update_poll(id, &update)
            .await
            .map_err(|err| map_write_error(id, err))?;
        info!(poll_id = %id, is_open = poll.is_open, "poll updated");
        Ok(poll)
    }

    async fn delete_poll(&self, id: &PollId) -> Result<(), Error> {
        let deleted = self
            .poll_repo
            .delete_poll(id)
            .await
            .map_err(map_persistence_error)?;
        if !deleted {
            return Err(Error::not_found(format!("poll {id} not found")));
        }
        info!(poll_id = %id, "poll deleted");
        Ok(())
    }
}

#[async_trait]
impl<R> PollsQuery for PollService<R>
where
    R: PollRepository,
{
    async fn get_poll(&self, id: &PollId, viewer: &UserId) -> Result<PollView, Error> {
        self.poll_repo
            .find_view(id, viewer)
            .await
            .map_err(map_persistence_error)?
            .ok_or_else(|| Error::not_found(format!("poll {id} not found")))
    }

    async fn list_polls(&self, viewer: &UserId) -> Result<Vec<PollView>, Error> {
        self.poll_repo
            .list_views(viewer)
            .await
            .map_err(map_persistence_error)
    }
}

#[async_trait]
impl<R> VoteCommand for PollService<R>
where
    R: PollRepository,
{
    async fn cast_vote(&self, ballot: &Ballot) -> Result<VoteUpdate, Error> {
        let new_count = self
            .poll_repo
            .cast_vote(ballot)
            .await
            .map_err(|err| map_vote_error(ballot, err))?;
        Ok(ballot.tally(new_count))
    }
}

#[cfg(test)]
#[path = "polls_tests.rs"]
mod tests;
