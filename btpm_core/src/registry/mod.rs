//! Connection and server registries.
//!
//! Owned maps keyed by the lookup handles the event paths actually use:
//! remote address and session id for outbound connections; server id, port,
//! session id and connection id for inbound endpoints. Entries are plain
//! owned values; removing one from its registry is the only teardown step.

pub mod connection;
pub mod server;

pub use connection::{ConnectionEntry, ConnectionRegistry};
pub use server::{ServerEntry, ServerRegistry};
