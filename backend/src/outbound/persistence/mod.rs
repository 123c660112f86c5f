//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Repository implementations only translate between Diesel rows and domain
//! types; the vote and poll write algorithms live in the domain ledger and run
//! here inside a Diesel transaction. Row structs (`models.rs`) and table
//! definitions (`schema.rs`) never leave this module.
//!
//! # Example
//!
//! ```no_run
//! use livepoll::outbound::persistence::{DbPool, DieselPollRepository, PoolConfig};
//!
//! # async fn wire() -> Result<(), livepoll::outbound::persistence::PoolError> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/livepoll")).await?;
//! let polls = DieselPollRepository::new(pool);
//! # let _ = polls;
//! # Ok(())
//! # }
//! ```

mod diesel_poll_repository;
mod diesel_user_repository;
mod error_mapping;
mod models;
mod pool;
mod schema;

pub use diesel_poll_repository::DieselPollRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
