//! Live polling backend library modules.
//!
//! The crate follows a hexagonal layout: `domain` owns types, services and
//! ports; `inbound` adapts HTTP and WebSocket traffic onto the domain;
//! `outbound` provides persistence and hashing adapters.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

pub use domain::TraceId;
pub use middleware::Trace;
