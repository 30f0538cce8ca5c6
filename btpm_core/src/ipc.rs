//! IPC transport trait and client request messages.
//!
//! Remote clients reach the manager through a message transport. Inbound
//! requests are decoded into [`IpcRequest`] values and posted to the work
//! queue; outbound events are serialized [`ProfileEvent`]s addressed to the
//! owning client.

use crate::mailbox::WorkItem;
use btpm_common::event::{Operation, QueryParams};
use btpm_common::flags::{ConnectFlags, IncomingPolicy};
use btpm_common::ids::{ClientId, ConnectionId, ServerId};
use btpm_common::status::ResponseStatus;
use btpm_common::{BdAddr, PmResult};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

/// One serialized event message addressed to a client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcMessage {
    pub target: ClientId,
    pub message_id: u32,
    pub payload: Vec<u8>,
}

/// A request decoded from a client message.
///
/// Every variant carries the sender's address; ownership checks compare it
/// against the entry's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IpcRequest {
    Connect {
        client: ClientId,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
    },
    Disconnect {
        client: ClientId,
        remote: BdAddr,
    },
    Abort {
        client: ClientId,
        remote: BdAddr,
    },
    Query {
        client: ClientId,
        remote: BdAddr,
        op: Operation,
        params: QueryParams,
    },
    SetPathAbsolute {
        client: ClientId,
        remote: BdAddr,
        path: String,
    },
    RegisterServer {
        client: ClientId,
        port: u8,
        capabilities: u32,
        policy: IncomingPolicy,
        name: String,
    },
    UnregisterServer {
        client: ClientId,
        server_id: ServerId,
    },
    ConnectionRequestResponse {
        client: ClientId,
        connection_id: ConnectionId,
        accept: bool,
    },
    CloseServerConnection {
        client: ClientId,
        connection_id: ConnectionId,
    },
    SendResponse {
        client: ClientId,
        connection_id: ConnectionId,
        op: Operation,
        status: ResponseStatus,
        size: Option<u32>,
        data: Vec<u8>,
        final_chunk: bool,
    },
}

impl IpcRequest {
    /// The sending client's address.
    pub fn client(&self) -> ClientId {
        match self {
            Self::Connect { client, .. }
            | Self::Disconnect { client, .. }
            | Self::Abort { client, .. }
            | Self::Query { client, .. }
            | Self::SetPathAbsolute { client, .. }
            | Self::RegisterServer { client, .. }
            | Self::UnregisterServer { client, .. }
            | Self::ConnectionRequestResponse { client, .. }
            | Self::CloseServerConnection { client, .. }
            | Self::SendResponse { client, .. } => *client,
        }
    }
}

/// The message transport between the manager and its clients.
///
/// `send` is only ever called with no manager lock held.
pub trait IpcTransport: Send + Sync {
    /// Queue one event message toward its client. Delivery is best-effort;
    /// a dead client is reported as an error and the event is dropped.
    fn send(&self, message: IpcMessage) -> PmResult<()>;

    /// The manager's own address, used to tag locally-owned entries.
    fn server_address(&self) -> ClientId;

    /// Allocate the next outbound message id.
    fn next_message_id(&self) -> u32;

    /// Start routing decoded client traffic into the given work queue.
    fn register_message_handler(&self, queue: Sender<WorkItem>) -> PmResult<()>;

    /// Stop routing client traffic.
    fn unregister_message_handler(&self);
}
