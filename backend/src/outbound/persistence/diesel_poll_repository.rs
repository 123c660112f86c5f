//! PostgreSQL-backed poll repository.
//!
//! Writes open one Diesel transaction, wrap the connection in a
//! [`LedgerTransaction`] and run the domain ledger inside it; any error rolls
//! the transaction back. Poll rows are locked with `FOR SHARE` while voting
//! and `FOR UPDATE` while editing, so closing a poll waits for in-flight
//! votes. The `votes_user_poll_key` constraint is the final arbiter of
//! one-vote-per-user.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{PollPersistenceError, PollRepository};
use crate::domain::vote_ledger::{self, PollHeader};
use crate::domain::{
    Ballot, LedgerTransaction, OptionId, OptionText, Poll, PollId, PollOption, PollTitle,
    PollUpdate, PollView, PollWriteError, UserId, VoteError,
};

use super::error_mapping::{
    ConstraintKind, counter_from_db, map_basic_diesel_error, map_basic_pool_error,
    violated_constraint,
};
use super::models::{NewOptionRow, NewPollRow, NewVoteRow, OptionRow, PollRow};
use super::pool::{DbPool, PoolError};
use super::schema::{poll_options, polls, votes};

const VOTES_USER_POLL_KEY: &str = "votes_user_poll_key";
const VOTES_POLL_OPTION_FKEY: &str = "votes_poll_option_fkey";
const VOTES_USER_ID_FKEY: &str = "votes_user_id_fkey";

fn map_pool_error(error: PoolError) -> PollPersistenceError {
    map_basic_pool_error(error, PollPersistenceError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> PollPersistenceError {
    match violated_constraint(&error) {
        Some((ConstraintKind::Unique, VOTES_USER_POLL_KEY)) => {
            PollPersistenceError::duplicate_vote()
        }
        Some((ConstraintKind::ForeignKey, VOTES_POLL_OPTION_FKEY)) => {
            PollPersistenceError::unknown_option()
        }
        Some((ConstraintKind::ForeignKey, VOTES_USER_ID_FKEY)) => {
            PollPersistenceError::unknown_voter()
        }
        _ => map_basic_diesel_error(
            error,
            PollPersistenceError::query,
            PollPersistenceError::connection,
        ),
    }
}

/// Error carried out of a Diesel transaction closure. Diesel needs to build
/// the error from its own failures (e.g. `COMMIT`), the ledger returns domain
/// errors.
enum TxFailure<E> {
    Ledger(E),
    Diesel(diesel::result::Error),
}

impl<E> From<diesel::result::Error> for TxFailure<E> {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl<E> TxFailure<E>
where
    E: From<PollPersistenceError>,
{
    fn into_inner(self) -> E {
        match self {
            Self::Ledger(error) => error,
            Self::Diesel(error) => E::from(map_diesel_error(error)),
        }
    }
}

fn row_to_header(row: PollRow) -> Result<PollHeader, PollPersistenceError> {
    let title = PollTitle::new(&row.title)
        .map_err(|err| PollPersistenceError::query(format!("stored poll title invalid: {err}")))?;
    Ok(PollHeader {
        id: PollId::from_uuid(row.id),
        title,
        is_open: row.is_open,
        created_at: row.created_at,
    })
}

fn row_to_option(row: OptionRow) -> Result<PollOption, PollPersistenceError> {
    let text = OptionText::new(&row.text)
        .map_err(|err| PollPersistenceError::query(format!("stored option text invalid: {err}")))?;
    let votes_count = counter_from_db(row.votes_count)
        .ok_or_else(|| PollPersistenceError::query("stored vote counter is negative"))?;
    Ok(PollOption {
        id: OptionId::from_uuid(row.id),
        text,
        votes_count,
    })
}

/// [`LedgerTransaction`] over a connection that is inside an open transaction.
struct DieselLedgerTx<'c> {
    conn: &'c mut AsyncPgConnection,
}

impl DieselLedgerTx<'_> {
    async fn lock_poll(
        &mut self,
        poll_id: &PollId,
        exclusive: bool,
    ) -> Result<Option<PollHeader>, PollPersistenceError> {
        let query = polls::table
            .find(poll_id.as_uuid())
            .select(PollRow::as_select());
        let result = if exclusive {
            query.for_update().first(self.conn).await
        } else {
            query.for_share().first(self.conn).await
        };
        let row: Option<PollRow> = result.optional().map_err(map_diesel_error)?;
        row.map(row_to_header).transpose()
    }
}

#[async_trait]
impl LedgerTransaction for DieselLedgerTx<'_> {
    async fn lock_poll_for_vote(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Option<PollHeader>, PollPersistenceError> {
        self.lock_poll(poll_id, false).await
    }

    async fn lock_poll_for_update(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Option<PollHeader>, PollPersistenceError> {
        self.lock_poll(poll_id, true).await
    }

    async fn vote_exists(
        &mut self,
        user_id: &UserId,
        poll_id: &PollId,
    ) -> Result<bool, PollPersistenceError> {
        diesel::select(exists(
            votes::table
                .filter(votes::user_id.eq(user_id.as_uuid()))
                .filter(votes::poll_id.eq(poll_id.as_uuid())),
        ))
        .get_result(self.conn)
        .await
        .map_err(map_diesel_error)
    }

    async fn insert_vote(&mut self, ballot: &Ballot) -> Result<(), PollPersistenceError> {
        let row = NewVoteRow {
            id: Uuid::new_v4(),
            user_id: *ballot.user_id.as_uuid(),
            poll_id: *ballot.poll_id.as_uuid(),
            option_id: *ballot.option_id.as_uuid(),
        };
        diesel::insert_into(votes::table)
            .values(&row)
            .execute(self.conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn increment_option(
        &mut self,
        poll_id: &PollId,
        option_id: &OptionId,
    ) -> Result<u32, PollPersistenceError> {
        let count: Option<i32> = diesel::update(
            poll_options::table
                .filter(poll_options::id.eq(option_id.as_uuid()))
                .filter(poll_options::poll_id.eq(poll_id.as_uuid())),
        )
        .set(poll_options::votes_count.eq(poll_options::votes_count + 1))
        .returning(poll_options::votes_count)
        .get_result(self.conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        let count = count.ok_or_else(PollPersistenceError::unknown_option)?;
        counter_from_db(count)
            .ok_or_else(|| PollPersistenceError::query("vote counter is negative"))
    }

    async fn insert_poll(&mut self, header: &PollHeader) -> Result<(), PollPersistenceError> {
        let row = NewPollRow {
            id: *header.id.as_uuid(),
            title: header.title.as_ref(),
            is_open: header.is_open,
            created_at: header.created_at,
        };
        diesel::insert_into(polls::table)
            .values(&row)
            .execute(self.conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn insert_options(
        &mut self,
        poll_id: &PollId,
        options: &[PollOption],
    ) -> Result<(), PollPersistenceError> {
        if options.is_empty() {
            return Ok(());
        }
        let rows = options
            .iter()
            .enumerate()
            .map(|(position, option)| -> Result<NewOptionRow, PollPersistenceError> {
                let position = i32::try_from(position)
                    .map_err(|_| PollPersistenceError::query("too many options"))?;
                let votes_count = i32::try_from(option.votes_count)
                    .map_err(|_| PollPersistenceError::query("vote counter overflow"))?;
                Ok(NewOptionRow {
                    id: *option.id.as_uuid(),
                    poll_id: *poll_id.as_uuid(),
                    position,
                    text: option.text.as_ref(),
                    votes_count,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        diesel::insert_into(poll_options::table)
            .values(&rows)
            .execute(self.conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn update_poll_header(
        &mut self,
        header: &PollHeader,
    ) -> Result<(), PollPersistenceError> {
        diesel::update(polls::table.find(header.id.as_uuid()))
            .set((
                polls::title.eq(header.title.as_ref()),
                polls::is_open.eq(header.is_open),
            ))
            .execute(self.conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn count_votes(&mut self, poll_id: &PollId) -> Result<u64, PollPersistenceError> {
        let count: i64 = votes::table
            .filter(votes::poll_id.eq(poll_id.as_uuid()))
            .count()
            .get_result(self.conn)
            .await
            .map_err(map_diesel_error)?;
        u64::try_from(count).map_err(|_| PollPersistenceError::query("negative vote count"))
    }

    async fn delete_options(&mut self, poll_id: &PollId) -> Result<(), PollPersistenceError> {
        diesel::delete(poll_options::table.filter(poll_options::poll_id.eq(poll_id.as_uuid())))
            .execute(self.conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn load_options(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Vec<PollOption>, PollPersistenceError> {
        let rows: Vec<OptionRow> = poll_options::table
            .filter(poll_options::poll_id.eq(poll_id.as_uuid()))
            .order_by(poll_options::position)
            .select(OptionRow::as_select())
            .load(self.conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_option).collect()
    }
}

type ViewRows = (Vec<PollRow>, Vec<OptionRow>, Vec<(Uuid, Uuid)>);

fn assemble_views(rows: ViewRows) -> Result<Vec<PollView>, PollPersistenceError> {
    let (poll_rows, option_rows, selections) = rows;
    let mut options_by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
    for row in option_rows {
        let poll_id = row.poll_id;
        options_by_poll
            .entry(poll_id)
            .or_default()
            .push(row_to_option(row)?);
    }
    let selected: HashMap<Uuid, Uuid> = selections.into_iter().collect();

    poll_rows
        .into_iter()
        .map(|row| -> Result<PollView, PollPersistenceError> {
            let poll_uuid = row.id;
            let options = options_by_poll.remove(&poll_uuid).unwrap_or_default();
            Ok(PollView {
                poll: row_to_header(row)?.with_options(options),
                selected_option: selected.get(&poll_uuid).copied().map(OptionId::from_uuid),
            })
        })
        .collect()
}

/// Diesel-backed implementation of the [`PollRepository`] port.
#[derive(Clone)]
pub struct DieselPollRepository {
    pool: DbPool,
}

impl DieselPollRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Read polls (all, or one), their options and the viewer's selections
    /// in one transaction so counters and selections agree.
    async fn load_views(
        &self,
        only: Option<&PollId>,
        viewer: &UserId,
    ) -> Result<Vec<PollView>, PollPersistenceError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let only = only.map(|id| *id.as_uuid());
        let viewer = *viewer.as_uuid();

        let rows: ViewRows = conn
            .transaction(|conn| {
                async move {
                    let poll_rows: Vec<PollRow> = match only {
                        Some(id) => {
                            polls::table
                                .filter(polls::id.eq(id))
                                .select(PollRow::as_select())
                                .load(conn)
                                .await?
                        }
                        None => {
                            polls::table
                                .select(PollRow::as_select())
                                .order_by((polls::created_at.desc(), polls::id))
                                .load(conn)
                                .await?
                        }
                    };
                    let ids: Vec<Uuid> = poll_rows.iter().map(|row| row.id).collect();

                    let option_rows: Vec<OptionRow> = poll_options::table
                        .filter(poll_options::poll_id.eq_any(&ids))
                        .order_by((poll_options::poll_id, poll_options::position))
                        .select(OptionRow::as_select())
                        .load(conn)
                        .await?;
                    let selections: Vec<(Uuid, Uuid)> = votes::table
                        .filter(votes::user_id.eq(viewer))
                        .filter(votes::poll_id.eq_any(&ids))
                        .select((votes::poll_id, votes::option_id))
                        .load(conn)
                        .await?;
                    Ok((poll_rows, option_rows, selections))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        assemble_views(rows)
    }
}

#[async_trait]
impl PollRepository for DieselPollRepository {
    async fn cast_vote(&self, ballot: &Ballot) -> Result<u32, VoteError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| VoteError::from(map_pool_error(err)))?;

        let new_count = conn
            .transaction(|conn| {
                async move {
                    let mut tx = DieselLedgerTx { conn };
                    vote_ledger::cast_vote(&mut tx, ballot)
                        .await
                        .map_err(TxFailure::Ledger)
                }
                .scope_boxed()
            })
            .await
            .map_err(TxFailure::into_inner)?;
        debug!(poll_id = %ballot.poll_id, new_count, "vote committed");
        Ok(new_count)
    }

    async fn create_poll(&self, poll: &Poll) -> Result<(), PollWriteError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let mut tx = DieselLedgerTx { conn };
                vote_ledger::create_poll(&mut tx, poll)
                    .await
                    .map_err(TxFailure::Ledger)
            }
            .scope_boxed()
        })
        .await
        .map_err(TxFailure::into_inner)
    }

    async fn update_poll(
        &self,
        id: &PollId,
        update: &PollUpdate,
    ) -> Result<Poll, PollWriteError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let mut tx = DieselLedgerTx { conn };
                vote_ledger::update_poll(&mut tx, id, update)
                    .await
                    .map_err(TxFailure::Ledger)
            }
            .scope_boxed()
        })
        .await
        .map_err(TxFailure::into_inner)
    }

    async fn delete_poll(&self, id: &PollId) -> Result<bool, PollPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(polls::table.find(id.as_uuid()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn find_view(
        &self,
        id: &PollId,
        viewer: &UserId,
    ) -> Result<Option<PollView>, PollPersistenceError> {
        Ok(self.load_views(Some(id), viewer).await?.into_iter().next())
    }

    async fn list_views(&self, viewer: &UserId) -> Result<Vec<PollView>, PollPersistenceError> {
        self.load_views(None, viewer).await
    }
}
