//! Response and connection status codes.

use serde::{Deserialize, Serialize};

/// Status carried by a query confirmation or sent in a server response.
///
/// Mirrors the OBEX-level response space of the Phone Book Access profile;
/// the Hands-Free adapter uses only `Success` / `ServiceUnavailable` /
/// `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ResponseStatus {
    Success = 0,
    NotFound = 1,
    ServiceUnavailable = 2,
    BadRequest = 3,
    NotImplemented = 4,
    Unauthorized = 5,
    PreconditionFailed = 6,
    NotAcceptable = 7,
    Forbidden = 8,
    DevicePowerOff = 9,
    UnableToSubmitRequest = 10,
    Unknown = 11,
}

impl ResponseStatus {
    /// Decode a wire value; out-of-range values collapse to `Unknown`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::NotFound,
            2 => Self::ServiceUnavailable,
            3 => Self::BadRequest,
            4 => Self::NotImplemented,
            5 => Self::Unauthorized,
            6 => Self::PreconditionFailed,
            7 => Self::NotAcceptable,
            8 => Self::Forbidden,
            9 => Self::DevicePowerOff,
            10 => Self::UnableToSubmitRequest,
            _ => Self::Unknown,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Result of an outbound connection attempt.
///
/// Returned by synchronous connects and carried by the asynchronous
/// connection-status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// The profile-level connection is up.
    Success,
    /// The remote device did not answer in time.
    Timeout,
    /// The remote device refused the connection.
    Refused,
    /// Link-level authentication or encryption failed.
    SecurityFailure,
    /// The local device powered off while the attempt was in flight.
    DevicePowerOff,
    /// Any other engine-reported failure.
    Unknown,
}

impl ConnectionStatus {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Reason carried by a disconnected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Normal close requested by either side.
    Normal,
    /// The connection attempt failed before reaching `Connected`.
    ConnectFailed(ConnectionStatus),
    /// The local device powered off.
    DevicePowerOff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_status_decode() {
        assert_eq!(ResponseStatus::from_u32(0), ResponseStatus::Success);
        assert_eq!(ResponseStatus::from_u32(7), ResponseStatus::NotAcceptable);
        assert_eq!(ResponseStatus::from_u32(999), ResponseStatus::Unknown);
    }

    #[test]
    fn success_predicates() {
        assert!(ResponseStatus::Success.is_success());
        assert!(!ResponseStatus::Forbidden.is_success());
        assert!(ConnectionStatus::Success.is_success());
        assert!(!ConnectionStatus::DevicePowerOff.is_success());
    }
}
