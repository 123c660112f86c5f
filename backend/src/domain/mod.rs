//! Domain primitives, services and ports.
//!
//! Purpose: define strongly typed entities shared by the inbound and outbound
//! adapters, the transactional vote ledger, and the in-process broadcast hub.
//! Types here never depend on Actix or Diesel.
//!
//! Public surface:
//! - `Error` / `ErrorCode`: transport-neutral failure payload.
//! - `Poll`, `PollOption`, `PollView`, `Ballot`, `VoteUpdate`: poll model.
//! - `User`, `UserId`, `EmailAddress`, `UserName`: account model.
//! - `PollService`, `AccountService`: use-case implementations of the
//!   driving ports.
//! - `VoteHub`, `Subscription`: live vote-count fan-out.

pub mod accounts;
pub mod auth;
pub mod broadcast;
pub mod error;
pub mod poll;
pub mod polls;
pub mod ports;
pub mod trace_id;
pub mod user;
pub mod vote_ledger;

pub use self::accounts::AccountService;
pub use self::auth::{LoginCredentials, LoginValidationError, PasswordHash};
pub use self::broadcast::{HubError, SubscriberId, Subscription, SubscriptionClosed, VoteHub};
pub use self::error::{Error, ErrorCode};
pub use self::poll::{
    Ballot, MAX_OPTIONS, MIN_OPTIONS, NewPoll, OptionId, OptionText, Poll, PollId, PollOption,
    PollTitle, PollUpdate, PollValidationError, PollView, VoteUpdate,
};
pub use self::polls::PollService;
pub use self::trace_id::TraceId;
pub use self::user::{
    AccountChanges, EmailAddress, NewAccount, User, UserId, UserName, UserValidationError,
};
pub use self::vote_ledger::{LedgerTransaction, PollWriteError, VoteError};

/// HTTP header used to surface the request trace identifier.
pub const TRACE_ID_HEADER: &str = "trace-id";
