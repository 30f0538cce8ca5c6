//! Security step selection.
//!
//! Pure decision functions mapping connect flags and incoming policies onto
//! the single security step (at most one) taken before the protocol-level
//! open. Encryption implies authentication at the link level, so when both
//! bits are set only the encryption request is issued.

use crate::device::StatusKind;
use btpm_common::ConnectionState;
use btpm_common::flags::{ConnectFlags, IncomingPolicy};

/// The action to take before opening a profile-level connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityAction {
    /// No gate applies; open (or accept) immediately.
    AcceptNow,
    /// Ask the owning client to authorize the inbound open.
    Authorize,
    /// Request link authentication, then open on success.
    Authenticate,
    /// Request link encryption, then open on success.
    Encrypt,
}

/// Select the step for an outbound connect with the given flags.
pub fn outbound_action(flags: ConnectFlags) -> SecurityAction {
    if flags.contains(ConnectFlags::REQUIRE_ENCRYPTION) {
        SecurityAction::Encrypt
    } else if flags.contains(ConnectFlags::REQUIRE_AUTHENTICATION) {
        SecurityAction::Authenticate
    } else {
        SecurityAction::AcceptNow
    }
}

/// Select the first step for an inbound open under the given policy.
///
/// Authorization comes first; link security runs after the owning client
/// accepts.
pub fn inbound_action(policy: IncomingPolicy) -> SecurityAction {
    if policy.contains(IncomingPolicy::REQUIRE_AUTHORIZATION) {
        SecurityAction::Authorize
    } else {
        post_authorization_action(policy)
    }
}

/// Select the link security step that follows a granted authorization.
pub fn post_authorization_action(policy: IncomingPolicy) -> SecurityAction {
    if policy.contains(IncomingPolicy::REQUIRE_ENCRYPTION) {
        SecurityAction::Encrypt
    } else if policy.contains(IncomingPolicy::REQUIRE_AUTHENTICATION) {
        SecurityAction::Authenticate
    } else {
        SecurityAction::AcceptNow
    }
}

/// The waiting state an entry enters for a pending action.
///
/// `AcceptNow` has no waiting state; callers handle it before asking.
pub fn pending_state(action: SecurityAction) -> ConnectionState {
    match action {
        SecurityAction::Authorize => ConnectionState::Authorizing,
        SecurityAction::Authenticate => ConnectionState::Authenticating,
        SecurityAction::Encrypt => ConnectionState::Encrypting,
        SecurityAction::AcceptNow => ConnectionState::Connecting,
    }
}

/// True if a device status event of `kind` resolves an entry in `state`.
///
/// Stale or mismatched status events (a late authentication event against an
/// entry that moved on, or one that is encrypting) are ignored.
pub fn status_resolves(state: ConnectionState, kind: StatusKind) -> bool {
    matches!(
        (state, kind),
        (ConnectionState::Authenticating, StatusKind::Authentication)
            | (ConnectionState::Encrypting, StatusKind::Encryption)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_takes_precedence_over_authentication() {
        let both = ConnectFlags::REQUIRE_AUTHENTICATION | ConnectFlags::REQUIRE_ENCRYPTION;
        assert_eq!(outbound_action(both), SecurityAction::Encrypt);
        assert_eq!(
            outbound_action(ConnectFlags::REQUIRE_AUTHENTICATION),
            SecurityAction::Authenticate
        );
        assert_eq!(outbound_action(ConnectFlags::empty()), SecurityAction::AcceptNow);
    }

    #[test]
    fn authorization_comes_before_link_security() {
        let policy = IncomingPolicy::REQUIRE_AUTHORIZATION | IncomingPolicy::REQUIRE_ENCRYPTION;
        assert_eq!(inbound_action(policy), SecurityAction::Authorize);
        assert_eq!(post_authorization_action(policy), SecurityAction::Encrypt);
    }

    #[test]
    fn inbound_without_authorization_goes_straight_to_link_security() {
        assert_eq!(
            inbound_action(IncomingPolicy::REQUIRE_AUTHENTICATION),
            SecurityAction::Authenticate
        );
        assert_eq!(inbound_action(IncomingPolicy::empty()), SecurityAction::AcceptNow);
    }

    #[test]
    fn inbound_both_link_bits_issue_only_encryption() {
        let policy = IncomingPolicy::REQUIRE_AUTHENTICATION | IncomingPolicy::REQUIRE_ENCRYPTION;
        assert_eq!(inbound_action(policy), SecurityAction::Encrypt);
    }

    #[test]
    fn pending_states() {
        assert_eq!(
            pending_state(SecurityAction::Authorize),
            ConnectionState::Authorizing
        );
        assert_eq!(
            pending_state(SecurityAction::Authenticate),
            ConnectionState::Authenticating
        );
        assert_eq!(pending_state(SecurityAction::Encrypt), ConnectionState::Encrypting);
    }

    #[test]
    fn mismatched_status_is_ignored() {
        assert!(status_resolves(
            ConnectionState::Authenticating,
            StatusKind::Authentication
        ));
        assert!(status_resolves(ConnectionState::Encrypting, StatusKind::Encryption));
        assert!(!status_resolves(
            ConnectionState::Encrypting,
            StatusKind::Authentication
        ));
        assert!(!status_resolves(
            ConnectionState::Connected,
            StatusKind::Encryption
        ));
    }
}
