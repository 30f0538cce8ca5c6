//! Opaque identifier newtypes and the wrapping id counter.
//!
//! Session and connection ids are assigned by the protocol engine; server,
//! client and callback ids are assigned locally from [`IdCounter`].

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Handle assigned by the protocol engine for one open profile session.
    SessionId
);
id_type!(
    /// Handle assigned per accepted inbound connection instance.
    ConnectionId
);
id_type!(
    /// Locally-assigned handle for a registered inbound server endpoint.
    ServerId
);
id_type!(
    /// IPC address of a client process (the daemon's own address included).
    ClientId
);
id_type!(
    /// Handle for a registered event callback.
    CallbackId
);
id_type!(
    /// SDP service record handle held by a registered server.
    ServiceHandle
);

/// Counter for locally-assigned ids.
///
/// Wraps before the sign bit so ids stay representable as small positive
/// integers, and skips zero on wraparound. No reuse-collision check beyond
/// the zero skip.
#[derive(Debug, Clone)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    /// Largest id handed out before wrapping.
    pub const MAX_ID: u32 = 0x7FFF_FFFF;

    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next id.
    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = if id >= Self::MAX_ID { 1 } else { id + 1 };
        id
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}
