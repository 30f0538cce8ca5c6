//! Error taxonomy shared by every public profile-manager operation.
//!
//! Every public operation validates (in order) module-initialized, parameter
//! well-formedness, power state, then ownership/existence of the addressed
//! entry, and returns the first applicable error. Engine-level failures are
//! mapped to the closest taxonomy member rather than passed through raw.

use crate::addr::BdAddr;
use crate::ids::{ConnectionId, ServerId};
use crate::status::ResponseStatus;
use thiserror::Error;

/// Result alias used across the workspace.
pub type PmResult<T> = Result<T, PmError>;

/// Error taxonomy for profile-manager operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PmError {
    /// The manager has not been initialized (or has been shut down).
    #[error("profile manager not initialized")]
    NotInitialized,

    /// A caller-supplied parameter is malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The local device is powered down.
    #[error("device powered down")]
    PoweredDown,

    /// No connection exists for the addressed remote device.
    #[error("no connection to {0}")]
    NotConnected(BdAddr),

    /// No server connection exists for the addressed connection id.
    #[error("invalid connection id {0}")]
    InvalidConnectionId(ConnectionId),

    /// The caller does not own the addressed connection or server.
    #[error("caller does not own the addressed entry")]
    InvalidClient,

    /// No server registration exists for the addressed server id.
    #[error("invalid server id {0}")]
    InvalidServerId(ServerId),

    /// The wrong high-level operation is in progress, or none is.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An outbound connection already exists for the remote device.
    #[error("already connected to {0}")]
    AlreadyConnected(BdAddr),

    /// A response/continuation buffer could not be allocated.
    #[error("unable to allocate buffer")]
    UnableToAllocate,

    /// The module context lock could not be acquired.
    #[error("unable to lock context")]
    UnableToLockContext,

    /// The protocol engine refused to open the connection.
    #[error("unable to connect")]
    UnableToConnect,

    /// The protocol engine refused to close the connection.
    #[error("unable to disconnect")]
    UnableToDisconnect,
}

impl PmError {
    /// The status reported back to a remote client whose request failed
    /// with this error.
    pub fn response_status(&self) -> ResponseStatus {
        match self {
            Self::InvalidParameter(_) => ResponseStatus::BadRequest,
            Self::PoweredDown => ResponseStatus::DevicePowerOff,
            Self::NotConnected(_) | Self::InvalidConnectionId(_) | Self::InvalidServerId(_) => {
                ResponseStatus::NotFound
            }
            Self::InvalidClient => ResponseStatus::Forbidden,
            Self::InvalidOperation(_) | Self::AlreadyConnected(_) => ResponseStatus::NotAcceptable,
            Self::UnableToConnect | Self::UnableToDisconnect => {
                ResponseStatus::UnableToSubmitRequest
            }
            Self::NotInitialized | Self::UnableToAllocate | Self::UnableToLockContext => {
                ResponseStatus::ServiceUnavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let addr = BdAddr([0, 1, 2, 3, 4, 5]);
        assert_eq!(
            PmError::NotConnected(addr).to_string(),
            "no connection to 00:01:02:03:04:05"
        );
        assert_eq!(
            PmError::InvalidConnectionId(ConnectionId(9)).to_string(),
            "invalid connection id 9"
        );
        assert!(PmError::NotInitialized.to_string().contains("not initialized"));
    }

    #[test]
    fn every_error_maps_to_a_failure_status() {
        assert_eq!(
            PmError::PoweredDown.response_status(),
            ResponseStatus::DevicePowerOff
        );
        assert_eq!(
            PmError::InvalidClient.response_status(),
            ResponseStatus::Forbidden
        );
        assert_eq!(
            PmError::NotConnected(BdAddr::NULL).response_status(),
            ResponseStatus::NotFound
        );
        assert!(!PmError::InvalidParameter("x".into()).response_status().is_success());
    }
}
