//! Driving port for poll reads scoped to a caller.

use async_trait::async_trait;

use crate::domain::{Error, PollId, PollView, UserId};

/// Domain use-case port for reading polls with the caller's vote status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollsQuery: Send + Sync {
    /// One poll with live counters and the caller's selection.
    async fn get_poll(&self, id: &PollId, viewer: &UserId) -> Result<PollView, Error>;

    /// Every poll, newest first.
    async fn list_polls(&self, viewer: &UserId) -> Result<Vec<PollView>, Error>;
}
