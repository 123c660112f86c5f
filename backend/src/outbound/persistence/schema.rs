//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered accounts. `email` is unique.
    users (id) {
        id -> Uuid,
        email -> Varchar,
        name -> Varchar,
        password_hash -> Text,
        active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Poll headers.
    polls (id) {
        id -> Uuid,
        title -> Varchar,
        is_open -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Options of a poll with their denormalised vote counters.
    ///
    /// `position` preserves the order options were supplied in.
    poll_options (id) {
        id -> Uuid,
        poll_id -> Uuid,
        position -> Int4,
        text -> Varchar,
        votes_count -> Int4,
    }
}

diesel::table! {
    /// Immutable vote records. `(user_id, poll_id)` is unique and
    /// `(poll_id, option_id)` references `poll_options (poll_id, id)`.
    votes (id) {
        id -> Uuid,
        user_id -> Uuid,
        poll_id -> Uuid,
        option_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(poll_options -> polls (poll_id));
diesel::joinable!(votes -> polls (poll_id));
diesel::joinable!(votes -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(users, polls, poll_options, votes);
