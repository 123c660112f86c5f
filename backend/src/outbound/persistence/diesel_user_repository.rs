//! PostgreSQL-backed user repository.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{UserPersistenceError, UserRecord, UserRepository};
use crate::domain::{EmailAddress, PasswordHash, User, UserId, UserName};

use super::error_mapping::{
    ConstraintKind, map_basic_diesel_error, map_basic_pool_error, violated_constraint,
};
use super::models::{NewUserRow, UserChangeset, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::users;

const USERS_EMAIL_KEY: &str = "users_email_key";
const VOTES_USER_ID_FKEY: &str = "votes_user_id_fkey";

fn map_pool_error(error: PoolError) -> UserPersistenceError {
    map_basic_pool_error(error, UserPersistenceError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserPersistenceError {
    match violated_constraint(&error) {
        Some((ConstraintKind::Unique, USERS_EMAIL_KEY)) => UserPersistenceError::duplicate_email(),
        Some((ConstraintKind::ForeignKey, VOTES_USER_ID_FKEY)) => UserPersistenceError::has_votes(),
        _ => map_basic_diesel_error(
            error,
            UserPersistenceError::query,
            UserPersistenceError::connection,
        ),
    }
}

fn row_to_user(row: UserRow) -> Result<UserRecord, UserPersistenceError> {
    let invalid = |field: &str, err: &dyn std::fmt::Display| {
        UserPersistenceError::query(format!("stored user {field} invalid: {err}"))
    };
    let email = EmailAddress::new(&row.email).map_err(|err| invalid("email", &err))?;
    let name = UserName::new(&row.name).map_err(|err| invalid("name", &err))?;
    Ok(UserRecord {
        user: User::new(
            UserId::from_uuid(row.id),
            email,
            name,
            row.active,
            row.created_at,
            row.updated_at,
        ),
        password_hash: PasswordHash::new(row.password_hash),
    })
}

/// Diesel-backed implementation of the [`UserRepository`] port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn insert(&self, record: &UserRecord) -> Result<(), UserPersistenceError> {
        let user = &record.user;
        let row = NewUserRow {
            id: *user.id().as_uuid(),
            email: user.email().as_ref(),
            name: user.name().as_ref(),
            password_hash: record.password_hash.as_str(),
            active: user.is_active(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(users::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .find(id.as_uuid())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserRecord>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email.as_ref()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_user).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserRow> = users::table
            .select(UserRow::as_select())
            .order_by((users::created_at, users::id))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter()
            .map(|row| row_to_user(row).map(|record| record.user))
            .collect()
    }

    async fn update(&self, record: &UserRecord) -> Result<bool, UserPersistenceError> {
        let user = &record.user;
        let changes = UserChangeset {
            email: user.email().as_ref(),
            name: user.name().as_ref(),
            password_hash: record.password_hash.as_str(),
            active: user.is_active(),
            updated_at: user.updated_at(),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(users::table.find(user.id().as_uuid()))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn delete(&self, id: &UserId) -> Result<bool, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(users::table.find(id.as_uuid()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }
}
