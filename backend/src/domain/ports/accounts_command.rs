//! Driving port for account mutations.

use async_trait::async_trait;

use crate::domain::{AccountChanges, Error, NewAccount, User, UserId};

/// Domain use-case port for creating, editing and removing accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountsCommand: Send + Sync {
    /// Self-service sign-up. The account is always active.
    async fn register(&self, account: NewAccount) -> Result<User, Error>;

    /// Administrative creation honouring the requested active flag.
    async fn create_user(&self, account: NewAccount) -> Result<User, Error>;

    /// Apply a partial update.
    async fn update_user(&self, id: &UserId, changes: AccountChanges) -> Result<User, Error>;

    /// Remove an account that has never voted.
    async fn delete_user(&self, id: &UserId) -> Result<(), Error>;
}
