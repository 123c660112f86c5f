//! Driving port for casting votes.

use async_trait::async_trait;

use crate::domain::{Ballot, Error, VoteUpdate};

/// Domain use-case port for the vote-cast entry point.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoteCommand: Send + Sync {
    /// Cast the ballot and return the committed count change.
    async fn cast_vote(&self, ballot: &Ballot) -> Result<VoteUpdate, Error>;
}
