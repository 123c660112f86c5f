//! Driven port for poll storage.
//!
//! Write operations run the vote ledger inside an adapter-owned transaction;
//! reads return committed state scoped to the viewer.

use async_trait::async_trait;

use crate::domain::{
    Ballot, Poll, PollId, PollUpdate, PollView, PollWriteError, UserId, VoteError,
};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by poll repository adapters.
    pub enum PollPersistenceError {
        /// Repository connection could not be established.
        Connection { message: String } => "poll repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "poll repository query failed: {message}",
        /// The `(user, poll)` uniqueness constraint rejected a vote.
        DuplicateVote => "a vote for this user and poll already exists",
        /// The option does not belong to the poll.
        UnknownOption => "option does not belong to the poll",
        /// The voter has no account row.
        UnknownVoter => "voter account does not exist",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollRepository: Send + Sync {
    /// Record one vote and return the option's new counter.
    async fn cast_vote(&self, ballot: &Ballot) -> Result<u32, VoteError>;

    /// Persist a poll with all of its options atomically.
    async fn create_poll(&self, poll: &Poll) -> Result<(), PollWriteError>;

    /// Apply an update atomically and return the stored poll.
    async fn update_poll(&self, id: &PollId, update: &PollUpdate)
    -> Result<Poll, PollWriteError>;

    /// Delete a poll with its options and votes. `false` when it was absent.
    async fn delete_poll(&self, id: &PollId) -> Result<bool, PollPersistenceError>;

    /// Load one poll with the viewer's selection.
    async fn find_view(
        &self,
        id: &PollId,
        viewer: &UserId,
    ) -> Result<Option<PollView>, PollPersistenceError>;

    /// Load every poll, newest first, with the viewer's selections.
    async fn list_views(&self, viewer: &UserId) -> Result<Vec<PollView>, PollPersistenceError>;
}
