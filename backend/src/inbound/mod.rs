//! Inbound adapters that translate external traffic into domain service calls
//! while keeping framework details at the edge.
//!
//! The JSON API lives under [`http`]; the live vote-count stream under [`ws`].

pub mod http;
pub mod ws;
