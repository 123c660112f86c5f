//! Ports for live vote-count events.
//!
//! The producer side is used by the vote handler after a committed cast; the
//! consumer side backs each streaming connection.

use async_trait::async_trait;

use crate::domain::{HubError, Subscription, VoteUpdate};

/// Producer side of the vote-count broadcast.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoteEventPublisher: Send + Sync {
    /// Fan `update` out to every current subscriber.
    async fn publish(&self, update: VoteUpdate) -> Result<(), HubError>;
}

/// Consumer side of the vote-count broadcast.
#[async_trait]
pub trait VoteFeed: Send + Sync {
    /// Register a new subscriber.
    async fn subscribe(&self) -> Result<Subscription, HubError>;
}
