//! Account domain service: registration, login and user administration.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::domain::ports::{
    AccountsCommand, LoginService, PasswordHasher, PasswordHasherError, UserPersistenceError,
    UserRecord, UserRepository, UsersQuery,
};
use crate::domain::{
    AccountChanges, EmailAddress, Error, LoginCredentials, NewAccount, PasswordHash, User,
    UserId,
};

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Hashed on first use and verified against for unknown emails, so they take
/// as long to reject as a wrong password.
const DECOY_PASSWORD: &str = "livepoll-decoy-password";

fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        UserPersistenceError::Query { message } => {
            Error::internal(format!("user repository error: {message}"))
        }
        UserPersistenceError::DuplicateEmail => {
            Error::conflict("email address is already registered")
                .with_details(json!({ "field": "email" }))
        }
        UserPersistenceError::HasVotes => {
            Error::conflict("user has cast votes; deactivate the account instead")
        }
    }
}

fn map_hasher_error(error: PasswordHasherError) -> Error {
    Error::internal(error.to_string())
}

fn user_not_found(id: &UserId) -> Error {
    Error::not_found(format!("user {id} not found"))
}

/// Account service implementing the login, account and user driving ports.
#[derive(Clone)]
pub struct AccountService<U, H> {
    user_repo: Arc<U>,
    hasher: Arc<H>,
    clock: Arc<dyn Clock>,
    decoy_hash: Arc<OnceCell<PasswordHash>>,
}

impl<U, H> AccountService<U, H> {
    /// Create a new service over the user repository and password hasher.
    pub fn new(user_repo: Arc<U>, hasher: Arc<H>, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_repo,
            hasher,
            clock,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }
}

impl<U, H> AccountService<U, H>
where
    U: UserRepository,
    H: PasswordHasher,
{
    async fn insert_account(&self, account: NewAccount) -> Result<User, Error> {
        let password_hash = self
            .hasher
            .hash(account.password.as_str())
            .await
            .map_err(map_hasher_error)?;
        let now = self.clock.utc();
        let user = User::new(
            UserId::random(),
            account.email,
            account.name,
            account.active,
            now,
            now,
        );
        let record = UserRecord {
            user,
            password_hash,
        };
        self.user_repo
            .insert(&record)
            .await
            .map_err(map_user_error)?;
        info!(user_id = %record.user.id(), "account created");
        Ok(record.user)
    }

    async fn verify_decoy(&self, password: &str) {
        let outcome = match self
            .decoy_hash
            .get_or_try_init(|| self.hasher.hash(DECOY_PASSWORD))
            .await
        {
            Ok(decoy) => self.hasher.verify(password, decoy).await.map(|_| ()),
            Err(error) => Err(error),
        };
        if let Err(error) = outcome {
            debug!(error = %error, "decoy password check failed");
        }
    }

    async fn load(&self, id: &UserId) -> Result<UserRecord, Error> {
        self.user_repo
            .find_by_id(id)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| user_not_found(id))
    }
}

#[async_trait]
impl<U, H> LoginService for AccountService<U, H>
where
    U: UserRepository,
    H: PasswordHasher,
{
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<UserId, Error> {
        let Ok(email) = EmailAddress::new(credentials.email()) else {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };
        let Some(record) = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(map_user_error)?
        else {
            debug!("login for unknown email");
            self.verify_decoy(credentials.password()).await;
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };

        let matches = self
            .hasher
            .verify(credentials.password(), &record.password_hash)
            .await
            .map_err(map_hasher_error)?;
        if !matches {
            debug!(user_id = %record.user.id(), "login with wrong password");
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        }
        if !record.user.is_active() {
            return Err(Error::forbidden("user is inactive"));
        }
        Ok(record.user.id().clone())
    }
}

#[async_trait]
impl<U, H> AccountsCommand for AccountService<U, H>
where
    U: UserRepository,
    H: PasswordHasher,
{
    async fn register(&self, account: NewAccount) -> Result<User, Error> {
        self.insert_account(NewAccount {
            active: true,
            ..account
        })
        .await
    }

    async fn create_user(&self, account: NewAccount) -> Result<User, Error> {
        self.insert_account(account).await
    }

    async fn update_user(&self, id: &UserId, changes: AccountChanges) -> Result<User, Error> {
        let mut record = self.load(id).await?;
        if changes.is_empty() {
            return Ok(record.user);
        }

        if let Some(password) = &changes.password {
            record.password_hash = self
                .hasher
                .hash(password.as_str())
                .await
                .map_err(map_hasher_error)?;
        }
        record.user.apply(&changes, self.clock.utc());

        let updated = self
            .user_repo
            .update(&record)
            .await
            .map_err(map_user_error)?;
        if !updated {
            return Err(user_not_found(id));
        }
        info!(user_id = %id, "account updated");
        Ok(record.user)
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), Error> {
        let deleted = self.user_repo.delete(id).await.map_err(map_user_error)?;
        if !deleted {
            return Err(user_not_found(id));
        }
        info!(user_id = %id, "account deleted");
        Ok(())
    }
}

#[async_trait]
impl<U, H> UsersQuery for AccountService<U, H>
where
    U: UserRepository,
    H: PasswordHasher,
{
    async fn profile(&self, authenticated_user: &UserId) -> Result<User, Error> {
        self.load(authenticated_user).await.map(|record| record.user)
    }

    async fn list_users(&self) -> Result<Vec<User>, Error> {
        self.user_repo.list().await.map_err(map_user_error)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, Error> {
        self.load(id).await.map(|record| record.user)
    }
}

#[cfg(test)]
#[path = "accounts_tests.rs"]
mod tests;
