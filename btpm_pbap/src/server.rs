//! Phone Book Access server (PSE) surface.

use btpm_common::event::Operation;
use btpm_common::flags::IncomingPolicy;
use btpm_common::ids::{ConnectionId, ServerId};
use btpm_common::status::ResponseStatus;
use btpm_common::{PmError, PmResult};
use btpm_core::dispatch::EventCallback;
use btpm_core::manager::ProfileManager;
use std::sync::Arc;
use tracing::info;

/// A registered phonebook server endpoint.
pub struct PbapServer {
    manager: Arc<ProfileManager>,
    server_id: ServerId,
}

impl PbapServer {
    /// Register a phonebook server on `port`.
    pub fn register(
        manager: Arc<ProfileManager>,
        port: u8,
        capabilities: u32,
        policy: IncomingPolicy,
        service_name: &str,
        callback: EventCallback,
    ) -> PmResult<Self> {
        let server_id = manager.register_server(
            manager.local_client(),
            Some(callback),
            port,
            capabilities,
            policy,
            service_name,
        )?;
        info!(%server_id, port, "phonebook server registered");
        Ok(Self { manager, server_id })
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Accept or reject an inbound open awaiting authorization.
    pub fn connection_request_response(
        &self,
        connection_id: ConnectionId,
        accept: bool,
    ) -> PmResult<()> {
        self.manager.connection_request_response(
            self.manager.local_client(),
            connection_id,
            accept,
        )
    }

    /// Close the live connection on this registration.
    pub fn close_connection(&self, connection_id: ConnectionId) -> PmResult<()> {
        self.manager
            .close_server_connection(self.manager.local_client(), connection_id)
    }

    /// Answer a phonebook or vCard pull with data.
    ///
    /// `size` carries the entry count for size queries; `final_chunk` false
    /// announces more data in a later call.
    pub fn send_response(
        &self,
        connection_id: ConnectionId,
        op: Operation,
        status: ResponseStatus,
        size: Option<u32>,
        data: Vec<u8>,
        final_chunk: bool,
    ) -> PmResult<()> {
        if op == Operation::SetPath && !data.is_empty() {
            return Err(PmError::InvalidParameter("set-path responses carry no body".into()));
        }
        self.manager.send_response(
            self.manager.local_client(),
            connection_id,
            op,
            status,
            size,
            data,
            final_chunk,
        )
    }

    /// Remove the registration, releasing its service record.
    pub fn unregister(self) -> PmResult<()> {
        self.manager
            .unregister_server(self.manager.local_client(), self.server_id)
    }
}
