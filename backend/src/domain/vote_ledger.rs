//! Transactional vote ledger.
//!
//! The algorithms here run *inside* a storage transaction supplied by an
//! outbound adapter through [`LedgerTransaction`]. Adapters open the
//! transaction, hand a borrowed view of it to one of these functions, then
//! commit on `Ok` and roll back on `Err`. Keeping the steps in the domain
//! means every backend enforces the same ordering:
//!
//! 1. lock the poll row (shared for votes, exclusive for edits);
//! 2. advisory duplicate check;
//! 3. insert the vote, relying on the storage-level `(user, poll)`
//!    uniqueness constraint as the real guard;
//! 4. bump the option counter atomically and return the new value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::ports::PollPersistenceError;
use super::{Ballot, OptionId, Poll, PollId, PollOption, PollTitle, PollUpdate, UserId};

/// Failures of the vote-cast operation. Every variant implies a rollback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    /// The poll does not exist or no longer accepts votes.
    #[error("poll is closed or does not exist")]
    PollClosed,
    /// The caller already holds a vote in this poll.
    #[error("user has already voted on this poll")]
    AlreadyVoted,
    /// The option is not part of the poll.
    #[error("option does not belong to this poll")]
    UnknownOption,
    /// The voter's account was deleted after the session was issued.
    #[error("voter account does not exist")]
    UnknownVoter,
    /// Any other storage failure.
    #[error("vote storage failed: {0}")]
    StorageFailure(#[source] PollPersistenceError),
}

impl From<PollPersistenceError> for VoteError {
    fn from(error: PollPersistenceError) -> Self {
        match error {
            PollPersistenceError::DuplicateVote => Self::AlreadyVoted,
            PollPersistenceError::UnknownOption => Self::UnknownOption,
            PollPersistenceError::UnknownVoter => Self::UnknownVoter,
            other => Self::StorageFailure(other),
        }
    }
}

/// Failures of poll create/update operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollWriteError {
    /// No poll with the given id.
    #[error("poll not found")]
    NotFound,
    /// Replacing options would orphan existing votes.
    #[error("options cannot be replaced once votes exist ({votes} cast)")]
    OptionsLocked { votes: u64 },
    /// Storage failure.
    #[error("poll storage failed: {0}")]
    Storage(#[from] PollPersistenceError),
}

/// Poll row without its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollHeader {
    /// Poll identifier.
    pub id: PollId,
    /// Display title.
    pub title: PollTitle,
    /// Whether votes are accepted.
    pub is_open: bool,
    /// Creation time, used to order listings newest first.
    pub created_at: DateTime<Utc>,
}

impl PollHeader {
    /// Attach options to build the full aggregate.
    pub fn with_options(self, options: Vec<PollOption>) -> Poll {
        Poll {
            id: self.id,
            title: self.title,
            is_open: self.is_open,
            created_at: self.created_at,
            options,
        }
    }
}

impl From<&Poll> for PollHeader {
    fn from(poll: &Poll) -> Self {
        Self {
            id: poll.id,
            title: poll.title.clone(),
            is_open: poll.is_open,
            created_at: poll.created_at,
        }
    }
}

/// Row-level primitives available inside one open storage transaction.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Load the poll header holding a shared lock until the transaction ends.
    async fn lock_poll_for_vote(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Option<PollHeader>, PollPersistenceError>;

    /// Load the poll header holding an exclusive lock until the transaction ends.
    async fn lock_poll_for_update(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Option<PollHeader>, PollPersistenceError>;

    /// Whether `user_id` already voted in `poll_id`.
    async fn vote_exists(
        &mut self,
        user_id: &UserId,
        poll_id: &PollId,
    ) -> Result<bool, PollPersistenceError>;

    /// Insert a vote row. Must fail with `DuplicateVote` when the
    /// `(user, poll)` pair exists, `UnknownOption` when the option is not
    /// part of the poll and `UnknownVoter` when the user has no account.
    async fn insert_vote(&mut self, ballot: &Ballot) -> Result<(), PollPersistenceError>;

    /// Atomically add one to the option counter and return the new value.
    async fn increment_option(
        &mut self,
        poll_id: &PollId,
        option_id: &OptionId,
    ) -> Result<u32, PollPersistenceError>;

    /// Insert a poll header.
    async fn insert_poll(&mut self, header: &PollHeader) -> Result<(), PollPersistenceError>;

    /// Insert options for a poll, preserving slice order.
    async fn insert_options(
        &mut self,
        poll_id: &PollId,
        options: &[PollOption],
    ) -> Result<(), PollPersistenceError>;

    /// Overwrite title and open flag.
    async fn update_poll_header(&mut self, header: &PollHeader)
    -> Result<(), PollPersistenceError>;

    /// Number of votes cast in the poll.
    async fn count_votes(&mut self, poll_id: &PollId) -> Result<u64, PollPersistenceError>;

    /// Remove every option of the poll.
    async fn delete_options(&mut self, poll_id: &PollId) -> Result<(), PollPersistenceError>;

    /// Options of the poll in insertion order.
    async fn load_options(
        &mut self,
        poll_id: &PollId,
    ) -> Result<Vec<PollOption>, PollPersistenceError>;
}

/// Cast one vote and return the option's post-increment counter.
///
/// # Errors
/// - [`VoteError::PollClosed`] when the poll is missing or closed.
/// - [`VoteError::AlreadyVoted`] from the pre-check or the uniqueness
///   constraint.
/// - [`VoteError::UnknownOption`] when the option is not in the poll.
/// - [`VoteError::UnknownVoter`] when the voter's account is gone.
/// - [`VoteError::StorageFailure`] for anything else.
pub async fn cast_vote<T>(tx: &mut T, ballot: &Ballot) -> Result<u32, VoteError>
where
    T: LedgerTransaction + ?Sized,
{
    let poll = tx.lock_poll_for_vote(&ballot.poll_id).await?;
    if !poll.is_some_and(|poll| poll.is_open) {
        return Err(VoteError::PollClosed);
    }

    if tx.vote_exists(&ballot.user_id, &ballot.poll_id).await? {
        return Err(VoteError::AlreadyVoted);
    }

    // A concurrent caller may pass the check above before either commits;
    // the constraint on insert settles it.
    tx.insert_vote(ballot).await?;
    let new_count = tx
        .increment_option(&ballot.poll_id, &ballot.option_id)
        .await?;
    debug!(
        poll_id = %ballot.poll_id,
        option_id = %ballot.option_id,
        new_count,
        "vote recorded"
    );
    Ok(new_count)
}

/// Insert a poll and all of its options.
pub async fn create_poll<T>(tx: &mut T, poll: &Poll) -> Result<(), PollWriteError>
where
    T: LedgerTransaction + ?Sized,
{
    tx.insert_poll(&PollHeader::from(poll)).await?;
    tx.insert_options(&poll.id, &poll.options).await?;
    Ok(())
}

/// Apply `update` to a poll and return the result.
///
/// Option replacement is refused once any vote has been cast, because votes
/// reference options by identity.
pub async fn update_poll<T>(
    tx: &mut T,
    poll_id: &PollId,
    update: &PollUpdate,
) -> Result<Poll, PollWriteError>
where
    T: LedgerTransaction + ?Sized,
{
    let Some(mut header) = tx.lock_poll_for_update(poll_id).await? else {
        return Err(PollWriteError::NotFound);
    };

    if let Some(texts) = &update.options {
        let votes = tx.count_votes(poll_id).await?;
        if votes > 0 {
            return Err(PollWriteError::OptionsLocked { votes });
        }
        let replacements: Vec<PollOption> =
            texts.iter().cloned().map(PollOption::fresh).collect();
        tx.delete_options(poll_id).await?;
        tx.insert_options(poll_id, &replacements).await?;
    }

    header.title = update.title.clone();
    header.is_open = update.is_open;
    tx.update_poll_header(&header).await?;

    let options = tx.load_options(poll_id).await?;
    Ok(header.with_options(options))
}

#[cfg(test)]
#[path = "vote_ledger_tests.rs"]
mod tests;
