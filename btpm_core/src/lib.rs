//! btpm Core Library
//!
//! The generic profile connection manager: one reusable core instantiated
//! per Bluetooth profile (Phone Book Access, Hands-Free). It tracks
//! outbound connections and inbound server registrations, walks each
//! connection through its security gates, buffers oversized responses for
//! peer-driven continuation, and dispatches events to local callbacks or
//! IPC clients without ever calling out under its lock.
//!
//! # Module Structure
//!
//! - [`manager`] - The profile manager: public operations and event handling
//! - [`registry`] - Connection and server registries
//! - [`dispatch`] - Deferred event delivery and the callback table
//! - [`mailbox`] - The serialized work queue and its worker thread
//! - [`engine`] - Protocol engine trait and events
//! - [`device`] - Device-layer control trait and events
//! - [`ipc`] - IPC transport trait and client request messages
//! - [`security`] - Security step selection
//! - [`path`] - Absolute path change cursor
//! - [`buffer`] - Response continuation buffer
//! - [`waiter`] - Synchronous-connect waiter
//! - [`sim`] - Simulated engine/device/transport for tests and demos

pub mod buffer;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod ipc;
pub mod mailbox;
pub mod manager;
pub mod path;
pub mod registry;
pub mod security;
pub mod sim;
pub mod waiter;

pub use dispatch::{CallbackRole, EventCallback};
pub use manager::ProfileManager;
