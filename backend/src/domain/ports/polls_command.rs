//! Driving port for poll mutations.

use async_trait::async_trait;

use crate::domain::{Error, NewPoll, Poll, PollId, PollUpdate};

/// Domain use-case port for creating, editing and deleting polls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollsCommand: Send + Sync {
    /// Create an open poll with zeroed counters.
    async fn create_poll(&self, poll: NewPoll) -> Result<Poll, Error>;

    /// Update title, open flag and optionally the option list.
    async fn update_poll(&self, id: &PollId, update: PollUpdate) -> Result<Poll, Error>;

    /// Delete a poll with its options and votes.
    async fn delete_poll(&self, id: &PollId) -> Result<(), Error>;
}
