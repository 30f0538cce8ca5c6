//! Connection state machine states.
//!
//! The progression applied uniformly to outbound and inbound connections:
//! `Idle -> Authorizing -> Authenticating -> Encrypting -> Connecting ->
//! Connected`, with a direct `Idle -> Connecting` shortcut when no security
//! policy bits are set. `Authorizing` occurs only on the inbound path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one profile-level connection (outbound or inbound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection activity.
    #[default]
    Idle,
    /// Awaiting the owning client's accept/reject decision (inbound only).
    Authorizing,
    /// Awaiting a device-layer authentication status event.
    Authenticating,
    /// Awaiting a device-layer encryption status event.
    Encrypting,
    /// The protocol engine has accepted the open; awaiting confirmation.
    Connecting,
    /// The profile-level connection is usable.
    Connected,
}

impl ConnectionState {
    /// Ordinal used to enforce the forward-only progression.
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Authorizing => 1,
            Self::Authenticating => 2,
            Self::Encrypting => 3,
            Self::Connecting => 4,
            Self::Connected => 5,
        }
    }

    /// True if `next` is a legal forward transition from `self`.
    ///
    /// Security steps may be skipped but never revisited: the observed
    /// sequence is always a subsequence of
    /// `Idle, Authorizing, Authenticating, Encrypting, Connecting, Connected`.
    /// Any state may fall back to `Idle` on failure or teardown.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        next == Self::Idle || next.rank() > self.rank()
    }

    /// True if the entry is waiting on an out-of-band security decision.
    #[inline]
    pub fn is_security_pending(self) -> bool {
        matches!(
            self,
            Self::Authorizing | Self::Authenticating | Self::Encrypting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::Authenticating => "authenticating",
            Self::Encrypting => "encrypting",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}
