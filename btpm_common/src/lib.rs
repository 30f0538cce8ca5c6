//! btpm Common Library
//!
//! Shared types for all btpm workspace crates: device addresses, opaque
//! identifiers, the error taxonomy, connection state, security/policy flags,
//! profile event records and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`addr`] - 48-bit Bluetooth device address
//! - [`ids`] - Opaque identifier newtypes and the wrapping id counter
//! - [`error`] - `PmError` taxonomy shared by every public operation
//! - [`flags`] - Connect / incoming-policy / per-entry bitflags
//! - [`state`] - Connection state machine states
//! - [`status`] - Response status and connection status codes
//! - [`event`] - Profile event records delivered to clients
//! - [`config`] - Configuration loading traits and types

pub mod addr;
pub mod config;
pub mod error;
pub mod event;
pub mod flags;
pub mod ids;
pub mod state;
pub mod status;

pub use addr::BdAddr;
pub use error::{PmError, PmResult};
pub use state::ConnectionState;
