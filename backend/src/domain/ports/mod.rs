//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`PollRepository`, `UserRepository`, `PasswordHasher`) are
//! implemented by outbound adapters. Driving ports (`PollsCommand`,
//! `PollsQuery`, `VoteCommand`, `LoginService`, `AccountsCommand`,
//! `UsersQuery`) are implemented by domain services and called by inbound
//! adapters. `VoteEventPublisher` and `VoteFeed` front the broadcast hub.

mod macros;
pub(crate) use macros::define_port_error;

mod accounts_command;
mod login_service;
mod password_hasher;
mod poll_repository;
mod polls_command;
mod polls_query;
mod user_repository;
mod users_query;
mod vote_command;
mod vote_events;

#[cfg(test)]
pub use accounts_command::MockAccountsCommand;
pub use accounts_command::AccountsCommand;
#[cfg(test)]
pub use login_service::MockLoginService;
pub use login_service::LoginService;
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use password_hasher::{PasswordHasher, PasswordHasherError};
#[cfg(test)]
pub use poll_repository::MockPollRepository;
pub use poll_repository::{PollPersistenceError, PollRepository};
#[cfg(test)]
pub use polls_command::MockPollsCommand;
pub use polls_command::PollsCommand;
#[cfg(test)]
pub use polls_query::MockPollsQuery;
pub use polls_query::PollsQuery;
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserPersistenceError, UserRecord, UserRepository};
#[cfg(test)]
pub use users_query::MockUsersQuery;
pub use users_query::UsersQuery;
#[cfg(test)]
pub use vote_command::MockVoteCommand;
pub use vote_command::VoteCommand;
#[cfg(test)]
pub use vote_events::MockVoteEventPublisher;
pub use vote_events::{VoteEventPublisher, VoteFeed};
