//! Driving port for user-facing queries.
//!
//! Inbound adapters use this port to fetch user-visible data without
//! importing outbound persistence concerns.

use async_trait::async_trait;

use crate::domain::{Error, User, UserId};

/// Domain use-case port for reading accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersQuery: Send + Sync {
    /// The authenticated caller's own account.
    async fn profile(&self, authenticated_user: &UserId) -> Result<User, Error>;

    /// Every account.
    async fn list_users(&self) -> Result<Vec<User>, Error>;

    /// One account by id.
    async fn get_user(&self, id: &UserId) -> Result<User, Error>;
}
