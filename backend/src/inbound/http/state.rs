//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and depend only on domain ports,
//! so they can be exercised with mocks and no I/O.

use std::sync::Arc;

use crate::domain::ports::{
    AccountsCommand, LoginService, PollsCommand, PollsQuery, UsersQuery, VoteCommand,
    VoteEventPublisher,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub login: Arc<dyn LoginService>,
    pub accounts: Arc<dyn AccountsCommand>,
    pub users: Arc<dyn UsersQuery>,
    pub polls: Arc<dyn PollsCommand>,
    pub polls_query: Arc<dyn PollsQuery>,
    pub votes: Arc<dyn VoteCommand>,
    pub vote_events: Arc<dyn VoteEventPublisher>,
}
