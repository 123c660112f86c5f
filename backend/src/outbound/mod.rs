//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **memory**: process-local repositories used when no database is configured
//! - **password**: Argon2id credential hashing
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. Poll writes delegate to the domain vote ledger inside
//! whatever transaction the adapter provides.

pub mod memory;
pub mod password;
pub mod persistence;
