//! Security and per-entry state bitflags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Caller-supplied security requirements for an outbound connect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ConnectFlags: u32 {
        /// Authenticate the link before opening the profile connection.
        const REQUIRE_AUTHENTICATION = 0x0001;
        /// Encrypt the link before opening the profile connection.
        const REQUIRE_ENCRYPTION     = 0x0002;
    }
}

bitflags! {
    /// Incoming-connection policy for a registered server endpoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct IncomingPolicy: u32 {
        /// The owning client must explicitly accept each inbound open.
        const REQUIRE_AUTHORIZATION  = 0x0001;
        /// Authenticate the link before accepting the open.
        const REQUIRE_AUTHENTICATION = 0x0002;
        /// Encrypt the link before accepting the open.
        const REQUIRE_ENCRYPTION     = 0x0004;
    }
}

bitflags! {
    /// Internal per-entry state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u32 {
        /// A phonebook/listing size query is outstanding.
        const PENDING_SIZE_QUERY    = 0x0001;
        /// An abort has been issued; discard late data confirmations.
        const PENDING_ABORT         = 0x0002;
        /// A multi-step absolute path change is in flight.
        const PENDING_ABSOLUTE_PATH = 0x0004;
        /// The connect was issued synchronously (a waiter is parked).
        const SYNCHRONOUS_CONNECT   = 0x0008;
        /// The entry is owned by a local callback, not an IPC client.
        const LOCALLY_HANDLED       = 0x0010;
        /// A close has been requested and is in progress.
        const CLOSING               = 0x0020;
    }
}

impl ConnectFlags {
    /// True if any link-level security step is required before the open.
    #[inline]
    pub fn security_required(&self) -> bool {
        !self.is_empty()
    }
}

impl IncomingPolicy {
    /// True if any link-level security step (not authorization) is required.
    #[inline]
    pub fn link_security_required(&self) -> bool {
        self.intersects(Self::REQUIRE_AUTHENTICATION | Self::REQUIRE_ENCRYPTION)
    }
}

impl Default for ConnectFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for IncomingPolicy {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for EntryFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_flags_security() {
        assert!(!ConnectFlags::empty().security_required());
        assert!(ConnectFlags::REQUIRE_AUTHENTICATION.security_required());
        assert!(ConnectFlags::REQUIRE_ENCRYPTION.security_required());
    }

    #[test]
    fn policy_link_security_excludes_authorization() {
        assert!(!IncomingPolicy::REQUIRE_AUTHORIZATION.link_security_required());
        assert!(IncomingPolicy::REQUIRE_AUTHENTICATION.link_security_required());
        assert!(
            (IncomingPolicy::REQUIRE_AUTHORIZATION | IncomingPolicy::REQUIRE_ENCRYPTION)
                .link_security_required()
        );
    }

    #[test]
    fn entry_flags_insert_remove() {
        let mut f = EntryFlags::empty();
        f.insert(EntryFlags::PENDING_ABORT);
        assert!(f.contains(EntryFlags::PENDING_ABORT));
        f.remove(EntryFlags::PENDING_ABORT);
        assert!(f.is_empty());
    }

    #[test]
    fn flag_bits_roundtrip() {
        let combo = IncomingPolicy::REQUIRE_AUTHORIZATION | IncomingPolicy::REQUIRE_ENCRYPTION;
        assert_eq!(IncomingPolicy::from_bits(combo.bits()).unwrap(), combo);
    }
}
