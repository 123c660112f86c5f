//! Poll model: polls, options, ballots and vote-count events.
//!
//! ## Invariants
//! - A poll always owns between [`MIN_OPTIONS`] and [`MAX_OPTIONS`] options.
//! - `PollOption::votes_count` equals the number of votes referencing the
//!   option; only the vote ledger changes it.
//! - Options keep the order they were supplied in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Fewest options a poll may carry.
pub const MIN_OPTIONS: usize = 2;
/// Most options a poll may carry.
pub const MAX_OPTIONS: usize = 20;
/// Maximum length of a poll title or option text, in characters.
pub const TEXT_MAX: usize = 200;

/// Validation failures for poll inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollValidationError {
    #[error("poll title must not be empty")]
    EmptyTitle,
    #[error("poll title must be at most {max} characters")]
    TitleTooLong { max: usize },
    #[error("option text must not be empty")]
    EmptyOptionText,
    #[error("option text must be at most {max} characters")]
    OptionTextTooLong { max: usize },
    #[error("a poll needs at least {min} options")]
    TooFewOptions { min: usize },
    #[error("a poll may have at most {max} options")]
    TooManyOptions { max: usize },
    #[error("identifier must be a valid UUID")]
    InvalidId,
}

impl PollValidationError {
    /// Request field the error refers to, for adapter error details.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyTitle | Self::TitleTooLong { .. } => "title",
            Self::EmptyOptionText
            | Self::OptionTextTooLong { .. }
            | Self::TooFewOptions { .. }
            | Self::TooManyOptions { .. } => "options",
            Self::InvalidId => "id",
        }
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = PollValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| PollValidationError::InvalidId)
            }
        }
    };
}

uuid_id!(
    /// Poll identifier.
    PollId
);
uuid_id!(
    /// Option identifier, unique across polls.
    OptionId
);

fn bounded_text(
    raw: &str,
    empty: PollValidationError,
    too_long: PollValidationError,
) -> Result<String, PollValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(empty);
    }
    if trimmed.chars().count() > TEXT_MAX {
        return Err(too_long);
    }
    Ok(trimmed.to_owned())
}

/// Poll question shown to voters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PollTitle(String);

impl PollTitle {
    /// Validate and trim a poll title.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PollValidationError> {
        bounded_text(
            raw.as_ref(),
            PollValidationError::EmptyTitle,
            PollValidationError::TitleTooLong { max: TEXT_MAX },
        )
        .map(Self)
    }
}

impl AsRef<str> for PollTitle {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<PollTitle> for String {
    fn from(value: PollTitle) -> Self {
        value.0
    }
}

impl TryFrom<String> for PollTitle {
    type Error = PollValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Label of one selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OptionText(String);

impl OptionText {
    /// Validate and trim an option label.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PollValidationError> {
        bounded_text(
            raw.as_ref(),
            PollValidationError::EmptyOptionText,
            PollValidationError::OptionTextTooLong { max: TEXT_MAX },
        )
        .map(Self)
    }
}

impl AsRef<str> for OptionText {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<OptionText> for String {
    fn from(value: OptionText) -> Self {
        value.0
    }
}

impl TryFrom<String> for OptionText {
    type Error = PollValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn option_list<S: AsRef<str>>(raw: &[S]) -> Result<Vec<OptionText>, PollValidationError> {
    if raw.len() < MIN_OPTIONS {
        return Err(PollValidationError::TooFewOptions { min: MIN_OPTIONS });
    }
    if raw.len() > MAX_OPTIONS {
        return Err(PollValidationError::TooManyOptions { max: MAX_OPTIONS });
    }
    raw.iter().map(OptionText::new).collect()
}

/// One selectable option and its live vote counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    pub id: OptionId,
    pub text: OptionText,
    pub votes_count: u32,
}

impl PollOption {
    /// A new option with a fresh identifier and no votes.
    pub fn fresh(text: OptionText) -> Self {
        Self {
            id: OptionId::random(),
            text,
            votes_count: 0,
        }
    }
}

/// A poll with its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    pub id: PollId,
    pub title: PollTitle,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Materialise a new, open poll with fresh identifiers.
    pub fn open(new_poll: NewPoll, created_at: DateTime<Utc>) -> Self {
        let NewPoll { title, options } = new_poll;
        Self {
            id: PollId::random(),
            title,
            is_open: true,
            created_at,
            options: options.into_iter().map(PollOption::fresh).collect(),
        }
    }

    /// Look up an option by id.
    pub fn option(&self, id: &OptionId) -> Option<&PollOption> {
        self.options.iter().find(|option| &option.id == id)
    }

    /// Sum of all option counters.
    pub fn total_votes(&self) -> u64 {
        self.options
            .iter()
            .map(|option| u64::from(option.votes_count))
            .sum()
    }
}

/// A poll as seen by one caller: which option (if any) they picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollView {
    pub poll: Poll,
    pub selected_option: Option<OptionId>,
}

impl PollView {
    /// Whether the caller has voted on this poll.
    pub fn voted(&self) -> bool {
        self.selected_option.is_some()
    }
}

/// Validated input for creating a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub title: PollTitle,
    pub options: Vec<OptionText>,
}

impl NewPoll {
    /// Validate raw inputs.
    ///
    /// # Examples
    /// ```
    /// use livepoll::domain::NewPoll;
    ///
    /// let poll = NewPoll::try_from_parts("Best editor?", &["vim", "emacs"]).unwrap();
    /// assert_eq!(poll.options.len(), 2);
    /// assert!(NewPoll::try_from_parts("Lonely", &["only"]).is_err());
    /// ```
    pub fn try_from_parts<S: AsRef<str>>(
        title: &str,
        options: &[S],
    ) -> Result<Self, PollValidationError> {
        Ok(Self {
            title: PollTitle::new(title)?,
            options: option_list(options)?,
        })
    }
}

/// Validated poll update. `options`, when present, replaces the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollUpdate {
    pub title: PollTitle,
    pub is_open: bool,
    pub options: Option<Vec<OptionText>>,
}

impl PollUpdate {
    /// Validate raw inputs.
    pub fn try_from_parts<S: AsRef<str>>(
        title: &str,
        is_open: bool,
        options: Option<&[S]>,
    ) -> Result<Self, PollValidationError> {
        Ok(Self {
            title: PollTitle::new(title)?,
            is_open,
            options: options.map(option_list).transpose()?,
        })
    }
}

/// One caller's request to vote for `option_id` in `poll_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub user_id: UserId,
}

impl Ballot {
    /// Build the broadcast event for this ballot once it has been counted.
    pub fn tally(&self, new_count: u32) -> VoteUpdate {
        VoteUpdate {
            poll_id: self.poll_id,
            option_id: self.option_id,
            new_count,
        }
    }
}

/// Vote-count change fanned out to live subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteUpdate {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub new_count: u32,
}
