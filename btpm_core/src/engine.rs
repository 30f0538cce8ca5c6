//! Protocol engine trait and events.
//!
//! The protocol engine is the profile's wire layer (OBEX for Phone Book
//! Access, RFCOMM/AT for Hands-Free). The manager drives it through
//! [`ProtocolEngine`] while holding its own lock; the engine never calls
//! back synchronously, it posts [`EngineEvent`]s to the manager work queue.

use btpm_common::event::{Operation, QueryParams};
use btpm_common::ids::{ConnectionId, ServiceHandle, SessionId};
use btpm_common::status::{ConnectionStatus, ResponseStatus};
use btpm_common::{BdAddr, PmResult};

/// Asynchronous protocol events posted to the manager work queue.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Outcome of an outbound open issued with [`ProtocolEngine::open`].
    OpenConfirmation {
        remote: BdAddr,
        session: SessionId,
        status: ConnectionStatus,
    },
    /// A remote device wants to open a connection to a registered service.
    OpenRequestIndication {
        port: u8,
        session: SessionId,
        connection_id: ConnectionId,
        remote: BdAddr,
    },
    /// An accepted inbound open completed.
    OpenIndication {
        connection_id: ConnectionId,
        remote: BdAddr,
    },
    /// A session closed. `connection_id` is set for inbound connections.
    CloseIndication {
        session: SessionId,
        connection_id: Option<ConnectionId>,
    },
    /// A submitted query produced a (possibly partial) result.
    QueryConfirmation {
        session: SessionId,
        op: Operation,
        status: ResponseStatus,
        /// Out-of-band size field for size queries and counted listings.
        size: Option<u32>,
        data: Vec<u8>,
        final_chunk: bool,
    },
    /// The remote peer issued a request against an inbound connection.
    ///
    /// A repeat of the in-progress operation kind is the peer's continuation
    /// request for more response data.
    RequestIndication {
        connection_id: ConnectionId,
        op: Operation,
        params: QueryParams,
    },
    /// A locally-issued abort completed.
    AbortConfirmation { session: SessionId },
    /// The remote peer aborted the operation on an inbound connection.
    AbortIndication { connection_id: ConnectionId },
}

/// The profile wire layer.
///
/// All methods are called with the manager lock held; implementations must
/// not invoke the manager re-entrantly. Results they produce later arrive
/// as [`EngineEvent`]s.
pub trait ProtocolEngine: Send {
    /// Open an outbound session to `remote` on `port`.
    ///
    /// Returns the session id immediately; the outcome arrives as an
    /// `OpenConfirmation` for the same remote.
    fn open(&mut self, remote: BdAddr, port: u8) -> PmResult<SessionId>;

    /// Accept or reject a pending inbound open.
    fn open_request_response(&mut self, connection_id: ConnectionId, accept: bool) -> PmResult<()>;

    /// Close an outbound session.
    fn close_session(&mut self, session: SessionId) -> PmResult<()>;

    /// Close an accepted inbound connection.
    fn close_connection(&mut self, connection_id: ConnectionId) -> PmResult<()>;

    /// Abort the operation in progress on an outbound session.
    fn abort(&mut self, session: SessionId) -> PmResult<()>;

    /// Submit a client-side query on an outbound session.
    fn submit_query(
        &mut self,
        session: SessionId,
        op: Operation,
        params: &QueryParams,
    ) -> PmResult<()>;

    /// Send one response packet on an inbound connection.
    ///
    /// Returns the number of bytes of `chunk` the engine accepted; the
    /// caller parks the remainder and resubmits on the peer's next
    /// continuation request. `final_chunk` marks the packet that completes
    /// the operation.
    fn send_response_chunk(
        &mut self,
        connection_id: ConnectionId,
        status: ResponseStatus,
        size: Option<u32>,
        chunk: &[u8],
        final_chunk: bool,
    ) -> PmResult<usize>;

    /// Register an inbound service endpoint (server port plus SDP record).
    fn register_service(&mut self, port: u8, name: &str, capabilities: u32)
    -> PmResult<ServiceHandle>;

    /// Remove a registered service endpoint and its SDP record.
    fn unregister_service(&mut self, handle: ServiceHandle) -> PmResult<()>;
}
