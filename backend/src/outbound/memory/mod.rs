//! In-memory storage adapter.
//!
//! Backs both [`PollRepository`] and [`UserRepository`] with process-local
//! tables so the server runs without PostgreSQL (local development, demos,
//! handler tests). It enforces the same constraints as the SQL schema:
//! unique `(user, poll)` votes, votes only from existing users, options
//! scoped to their poll, unique emails, cascade from polls and restrict from
//! users with votes.
//!
//! Writes are serialised by one async mutex. A ledger run mutates the tables
//! in place and journals an undo step for every change; when the ledger
//! returns `Err` the journal is replayed backwards, so failures leave no
//! partial writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::{
    PollPersistenceError, PollRepository, UserPersistenceError, UserRecord, UserRepository,
};
use crate::domain::vote_ledger::{self, PollHeader};
use crate::domain::{
    Ballot, EmailAddress, LedgerTransaction, OptionId, Poll, PollId, PollOption, PollUpdate,
    PollView, PollWriteError, User, UserId, VoteError,
};

type PollVotes = HashMap<UserId, OptionId>;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, UserRecord>,
    polls: HashMap<PollId, PollHeader>,
    options: HashMap<PollId, Vec<PollOption>>,
    votes: HashMap<PollId, PollVotes>,
}

impl Tables {
    fn view(&self, header: &PollHeader, viewer: &UserId) -> PollView {
        let options = self.options.get(&header.id).cloned().unwrap_or_default();
        PollView {
            poll: header.clone().with_options(options),
            selected_option: self
                .votes
                .get(&header.id)
                .and_then(|votes| votes.get(viewer))
                .copied(),
        }
    }

    fn has_voted(&self, user_id: &UserId) -> bool {
        self.votes.values().any(|votes| votes.contains_key(user_id))
    }
}

/// Inverse of one mutation made inside a [`MemoryTx`].
#[derive(Debug)]
enum Undo {
    RemoveVote {
        poll_id: PollId,
        user_id: UserId,
    },
    RestoreCount {
        poll_id: PollId,
        option_id: OptionId,
        count: u32,
    },
    RemovePoll(PollId),
    RestoreHeader(PollHeader),
    RestoreOptions {
        poll_id: PollId,
        options: Option<Vec<PollOption>>,
    },
    RestoreVotes {
        poll_id: PollId,
        votes: Option<PollVotes>,
    },
}

impl Undo {
    fn revert(self, tables: &mut Tables) {
        match self {
            Self::RemoveVote { poll_id, user_id } => {
                if let Some(votes) = tables.votes.get_mut(&poll_id) {
                    votes.remove(&user_id);
                }
            }
            Self::RestoreCount {
                poll_id,
                option_id,
                count,
            } => {
                let option = tables
                    .options
                    .get_mut(&poll_id)
                    .and_then(|options| options.iter_mut().find(|o| o.id == option_id));
                if let Some(option) = option {
                    option.votes_count = count;
                }
            }
            Self::RemovePoll(poll_id) => {
                tables.polls.remove(&poll_id);
            }
            Self::RestoreHeader(header) => {
                tables.polls.insert(header.id, header);
            }
            Self::RestoreOptions { poll_id, options } => {
                restore(&mut tables.options, poll_id, options);
            }
            Self::RestoreVotes { poll_id, votes } => restore(&mut tables.votes, poll_id, votes),
        }
    }
}

fn restore<V>(table: &mut HashMap<PollId, V>, poll_id: PollId, previous: Option<V>) {
    match previous {
        Some(value) => {
            table.insert(poll_id, value);
        }
        None => {
            table.remove(&poll_id);
        }
    }
}

/// Ledger transaction over the locked tables. Row locks are implicit: the
/// whole store is locked for the duration of the transaction.
struct MemoryTx<'a> {
    tables: &'a mut Tables,
    journal: Vec<Undo>,
}

impl<'a> MemoryTx<'a> {
    fn new(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            journal: Vec::new(),
        }
    }

    /// Keep the changes on `Ok`, replay the journal backwards on `Err`.
    fn finish<T, E>(self, outcome: Result<T, E>) -> Result<T, E> {
        if outcome.is_err() {
            let Self { tables, journal } = self;
            for undo in journal.into_iter().rev() {
                undo.revert(tables);
            }
        }
        outcome
    }
}

#[async_trait]
impl LedgerTransaction for MemoryTx<'_> {
    async fn lock_poll_for_vote(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Option<PollHeader>, PollPersistenceError> {
        Ok(self.tables.polls.get(poll_id).cloned())
    }

    async fn lock_poll_for_update(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Option<PollHeader>, PollPersistenceError> {
        Ok(self.tables.polls.get(poll_id).cloned())
    }

    async fn vote_exists(
        &mut self,
        user_id: &UserId,
        poll_id: &PollId,
    ) -> Result<bool, PollPersistenceError> {
        Ok(self
            .tables
            .votes
            .get(poll_id)
            .is_some_and(|votes| votes.contains_key(user_id)))
    }

    async fn insert_vote(&mut self, ballot: &Ballot) -> Result<(), PollPersistenceError> {
        let duplicate = self
            .tables
            .votes
            .get(&ballot.poll_id)
            .is_some_and(|votes| votes.contains_key(&ballot.user_id));
        if duplicate {
            return Err(PollPersistenceError::duplicate_vote());
        }
        if !self.tables.users.contains_key(&ballot.user_id) {
            return Err(PollPersistenceError::unknown_voter());
        }
        let option_in_poll = self
            .tables
            .options
            .get(&ballot.poll_id)
            .is_some_and(|options| options.iter().any(|o| o.id == ballot.option_id));
        if !option_in_poll {
            return Err(PollPersistenceError::unknown_option());
        }
        self.tables
            .votes
            .entry(ballot.poll_id)
            .or_default()
            .insert(ballot.user_id.clone(), ballot.option_id);
        self.journal.push(Undo::RemoveVote {
            poll_id: ballot.poll_id,
            user_id: ballot.user_id.clone(),
        });
        Ok(())
    }

    async fn increment_option(
        &mut self,
        poll_id: &PollId,
        option_id: &OptionId,
    ) -> Result<u32, PollPersistenceError> {
        let option = self
            .tables
            .options
            .get_mut(poll_id)
            .and_then(|options| options.iter_mut().find(|o| &o.id == option_id))
            .ok_or_else(PollPersistenceError::unknown_option)?;
        let previous = option.votes_count;
        option.votes_count = previous
            .checked_add(1)
            .ok_or_else(|| PollPersistenceError::query("vote counter overflow"))?;
        let new_count = option.votes_count;
        self.journal.push(Undo::RestoreCount {
            poll_id: *poll_id,
            option_id: *option_id,
            count: previous,
        });
        Ok(new_count)
    }

    async fn insert_poll(&mut self, header: &PollHeader) -> Result<(), PollPersistenceError> {
        if self.tables.polls.contains_key(&header.id) {
            return Err(PollPersistenceError::query("poll id already exists"));
        }
        self.tables.polls.insert(header.id, header.clone());
        self.journal.push(Undo::RemovePoll(header.id));
        Ok(())
    }

    async fn insert_options(
        &mut self,
        poll_id: &PollId,
        options: &[PollOption],
    ) -> Result<(), PollPersistenceError> {
        if !self.tables.polls.contains_key(poll_id) {
            return Err(PollPersistenceError::query("options reference a missing poll"));
        }
        let existing = self.tables.options.entry(*poll_id).or_default();
        let previous = (!existing.is_empty()).then(|| existing.clone());
        existing.extend_from_slice(options);
        self.journal.push(Undo::RestoreOptions {
            poll_id: *poll_id,
            options: previous,
        });
        Ok(())
    }

    async fn update_poll_header(
        &mut self,
        header: &PollHeader,
    ) -> Result<(), PollPersistenceError> {
        if let Some(previous) = self.tables.polls.insert(header.id, header.clone()) {
            self.journal.push(Undo::RestoreHeader(previous));
        } else {
            self.journal.push(Undo::RemovePoll(header.id));
        }
        Ok(())
    }

    async fn count_votes(&mut self, poll_id: &PollId) -> Result<u64, PollPersistenceError> {
        let cast = self.tables.votes.get(poll_id).map_or(0, HashMap::len);
        Ok(cast as u64)
    }

    async fn delete_options(&mut self, poll_id: &PollId) -> Result<(), PollPersistenceError> {
        let options = self.tables.options.remove(poll_id);
        let votes = self.tables.votes.remove(poll_id);
        self.journal.push(Undo::RestoreOptions {
            poll_id: *poll_id,
            options,
        });
        self.journal.push(Undo::RestoreVotes {
            poll_id: *poll_id,
            votes,
        });
        Ok(())
    }

    async fn load_options(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Vec<PollOption>, PollPersistenceError> {
        Ok(self.tables.options.get(poll_id).cloned().unwrap_or_default())
    }
}

/// Process-local store implementing the poll and user repository ports.
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollRepository for InMemoryStore {
    async fn cast_vote(&self, ballot: &Ballot) -> Result<u32, VoteError> {
        let mut tables = self.tables.lock().await;
        let mut tx = MemoryTx::new(&mut tables);
        let outcome = vote_ledger::cast_vote(&mut tx, ballot).await;
        tx.finish(outcome)
    }

    async fn create_poll(&self, poll: &Poll) -> Result<(), PollWriteError> {
        let mut tables = self.tables.lock().await;
        let mut tx = MemoryTx::new(&mut tables);
        let outcome = vote_ledger::create_poll(&mut tx, poll).await;
        tx.finish(outcome)
    }

    async fn update_poll(
        &self,
        id: &PollId,
        update: &PollUpdate,
    ) -> Result<Poll, PollWriteError> {
        let mut tables = self.tables.lock().await;
        let mut tx = MemoryTx::new(&mut tables);
        let outcome = vote_ledger::update_poll(&mut tx, id, update).await;
        tx.finish(outcome)
    }

    async fn delete_poll(&self, id: &PollId) -> Result<bool, PollPersistenceError> {
        let mut tables = self.tables.lock().await;
        if tables.polls.remove(id).is_none() {
            return Ok(false);
        }
        tables.options.remove(id);
        tables.votes.remove(id);
        Ok(true)
    }

    async fn find_view(
        &self,
        id: &PollId,
        viewer: &UserId,
    ) -> Result<Option<PollView>, PollPersistenceError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .polls
            .get(id)
            .map(|header| tables.view(header, viewer)))
    }

    async fn list_views(&self, viewer: &UserId) -> Result<Vec<PollView>, PollPersistenceError> {
        let tables = self.tables.lock().await;
        let mut headers: Vec<&PollHeader> = tables.polls.values().collect();
        headers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(headers
            .into_iter()
            .map(|header| tables.view(header, viewer))
            .collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, record: &UserRecord) -> Result<(), UserPersistenceError> {
        let mut tables = self.tables.lock().await;
        let email_taken = tables
            .users
            .values()
            .any(|existing| existing.user.email() == record.user.email());
        if email_taken {
            return Err(UserPersistenceError::duplicate_email());
        }
        if tables.users.contains_key(record.user.id()) {
            return Err(UserPersistenceError::query("user id already exists"));
        }
        tables
            .users
            .insert(record.user.id().clone(), record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, UserPersistenceError> {
        Ok(self.tables.lock().await.users.get(id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserRecord>, UserPersistenceError> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|record| record.user.email() == email)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, UserPersistenceError> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .map(|record| record.user.clone())
            .collect();
        users.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().as_uuid().cmp(b.id().as_uuid()))
        });
        Ok(users)
    }

    async fn update(&self, record: &UserRecord) -> Result<bool, UserPersistenceError> {
        let mut tables = self.tables.lock().await;
        let id = record.user.id();
        let email_taken = tables.users.values().any(|existing| {
            existing.user.id() != id && existing.user.email() == record.user.email()
        });
        if email_taken {
            return Err(UserPersistenceError::duplicate_email());
        }
        match tables.users.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &UserId) -> Result<bool, UserPersistenceError> {
        let mut tables = self.tables.lock().await;
        if tables.has_voted(id) {
            return Err(UserPersistenceError::has_votes());
        }
        Ok(tables.users.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests;
