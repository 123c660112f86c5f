//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{poll_options, polls, users, votes};

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating user records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset for overwriting mutable user columns.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct UserChangeset<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Row struct for reading poll headers.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = polls)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PollRow {
    pub id: Uuid,
    pub title: String,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
}

/// Insertable poll header.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = polls)]
pub(crate) struct NewPollRow<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
}

/// Row struct for reading poll options.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = poll_options)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OptionRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub text: String,
    pub votes_count: i32,
}

/// Insertable poll option.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = poll_options)]
pub(crate) struct NewOptionRow<'a> {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub position: i32,
    pub text: &'a str,
    pub votes_count: i32,
}

/// Insertable vote. `created_at` uses the column default.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = votes)]
pub(crate) struct NewVoteRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
}
