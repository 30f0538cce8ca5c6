//! Profile event records and query descriptors.
//!
//! A [`ProfileEvent`] is built by the manager when a protocol-engine or
//! device-layer callback completes, then handed to the dispatcher which
//! delivers it to exactly one recipient: the registered local callback or
//! the owning IPC client. Payloads are owned (`String` / `Vec<u8>`), so one
//! move covers the whole record.

use crate::addr::BdAddr;
use crate::ids::{ConnectionId, ServerId, SessionId};
use crate::status::{ConnectionStatus, DisconnectReason, ResponseStatus};
use serde::{Deserialize, Serialize};

/// High-level operation kinds shared by both profile adapters.
///
/// The Phone Book Access adapter maps its request names onto these
/// (PullPhoneBook -> `PullList`, PullvCard -> `PullEntry`, ...); the
/// Hands-Free adapter uses none of the pull kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operation {
    /// No operation in progress.
    #[default]
    None,
    /// Pull the object list (phonebook) for the current path.
    PullList,
    /// Pull only the size of the object list.
    PullListSize,
    /// Change the current path by one step.
    SetPath,
    /// Pull the entry listing for a folder.
    PullEntryListing,
    /// Pull only the size of an entry listing.
    PullEntryListingSize,
    /// Pull a single entry by name.
    PullEntry,
}

/// Direction of a single path-change step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetPathOption {
    /// Move to the root of the store.
    Root,
    /// Descend into the named child folder.
    Down,
    /// Move up one level.
    Up,
}

/// Parameters attached to a query request.
///
/// A single descriptor covers both adapters; each fills only the fields its
/// profile defines. Kept on the connection entry so a failed or aborted
/// request can be recovered or reported with its original arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Object or folder name (phonebook object, vCard name, folder).
    pub object_name: Option<String>,
    /// Property filter bits (profile-defined).
    pub filter: u64,
    /// Requested entry format (profile-defined, e.g. vCard 2.1/3.0).
    pub format: Option<u8>,
    /// Listing order (profile-defined).
    pub order: Option<u8>,
    /// Search attribute (profile-defined).
    pub search_attribute: Option<u8>,
    /// Search value matched against the attribute.
    pub search_value: Option<String>,
    /// Maximum number of entries to return.
    pub max_list_count: Option<u16>,
    /// Offset of the first entry to return.
    pub list_start_offset: u16,
    /// Path-change direction, for `SetPath` requests.
    pub path_option: Option<SetPathOption>,
}

/// One asynchronous event delivered to a profile client.
///
/// Ownership transfers to the dispatcher for the duration of one delivery;
/// the recipient must not retain references beyond the callback's extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfileEvent {
    /// Outcome of an outbound connection attempt.
    ConnectionStatus {
        remote: BdAddr,
        status: ConnectionStatus,
    },
    /// An outbound connection reached `Connected`.
    Connected {
        remote: BdAddr,
        session: SessionId,
    },
    /// An outbound connection closed.
    Disconnected {
        remote: BdAddr,
        reason: DisconnectReason,
    },
    /// An inbound open awaits the owning client's authorization decision.
    ConnectionRequest {
        server_id: ServerId,
        connection_id: ConnectionId,
        remote: BdAddr,
    },
    /// An inbound connection reached `Connected`.
    ServerConnected {
        server_id: ServerId,
        connection_id: ConnectionId,
        remote: BdAddr,
    },
    /// An inbound connection closed; the registration itself survives.
    ServerDisconnected {
        server_id: ServerId,
        connection_id: ConnectionId,
    },
    /// The remote peer issued a request against a registered server.
    RequestIndication {
        server_id: ServerId,
        connection_id: ConnectionId,
        op: Operation,
        params: QueryParams,
    },
    /// A client-side query finished (or produced a partial chunk).
    QueryComplete {
        remote: BdAddr,
        op: Operation,
        status: ResponseStatus,
        /// Out-of-band size/count field (size queries, listing counts).
        size: Option<u32>,
        data: Vec<u8>,
        final_chunk: bool,
    },
    /// A path change (single step or absolute) finished.
    PathChanged {
        remote: BdAddr,
        status: ResponseStatus,
        current_path: String,
    },
    /// An abort completed. Delivered exactly once per abort request.
    Aborted { remote: BdAddr },
    /// A client request failed validation; no operation was started.
    RequestFailed {
        /// Short name of the rejected request kind.
        request: String,
        status: ResponseStatus,
    },
}

impl ProfileEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionStatus { .. } => "connection-status",
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::ConnectionRequest { .. } => "connection-request",
            Self::ServerConnected { .. } => "server-connected",
            Self::ServerDisconnected { .. } => "server-disconnected",
            Self::RequestIndication { .. } => "request-indication",
            Self::QueryComplete { .. } => "query-complete",
            Self::PathChanged { .. } => "path-changed",
            Self::Aborted { .. } => "aborted",
            Self::RequestFailed { .. } => "request-failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_for_ipc() {
        let event = ProfileEvent::QueryComplete {
            remote: BdAddr([1, 2, 3, 4, 5, 6]),
            op: Operation::PullList,
            status: ResponseStatus::Success,
            size: Some(12),
            data: b"BEGIN:VCARD".to_vec(),
            final_chunk: false,
        };
        let text = serde_json::to_string(&event).unwrap();
        let back: ProfileEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn kind_names() {
        let e = ProfileEvent::Aborted { remote: BdAddr::NULL };
        assert_eq!(e.kind(), "aborted");
    }

    #[test]
    fn default_operation_is_none() {
        assert_eq!(Operation::default(), Operation::None);
    }
}
