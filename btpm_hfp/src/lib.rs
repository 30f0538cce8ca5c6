//! btpm Hands-Free Library
//!
//! The Hands-Free profile adapter over the shared profile manager core.
//! Hands-Free connections come in two local roles (hands-free unit and
//! audio gateway), each with its own callback registration slot. Only the
//! holder of a role's control callback may change connection state; other
//! registrations observe events but can not act.

use btpm_common::flags::{ConnectFlags, IncomingPolicy};
use btpm_common::ids::{CallbackId, ConnectionId, ServerId};
use btpm_common::status::ConnectionStatus;
use btpm_common::{BdAddr, PmError, PmResult};
use btpm_core::dispatch::{CallbackRole, EventCallback};
use btpm_core::manager::ProfileManager;
use std::sync::Arc;
use tracing::info;

/// Local role of a Hands-Free connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HfpRole {
    /// The hands-free unit (headset, car kit).
    HandsFree,
    /// The audio gateway (the phone).
    AudioGateway,
}

impl HfpRole {
    fn callback_role(self) -> CallbackRole {
        match self {
            Self::HandsFree => CallbackRole(0),
            Self::AudioGateway => CallbackRole(1),
        }
    }

    /// Default RFCOMM server port for the role's inbound server.
    pub fn default_port(self) -> u8 {
        match self {
            Self::HandsFree => 5,
            Self::AudioGateway => 3,
        }
    }
}

/// Hands-Free access for one local role.
pub struct HfpManager {
    manager: Arc<ProfileManager>,
    role: HfpRole,
}

impl HfpManager {
    pub fn new(manager: Arc<ProfileManager>, role: HfpRole) -> Self {
        Self { manager, role }
    }

    pub fn role(&self) -> HfpRole {
        self.role
    }

    pub fn manager(&self) -> &Arc<ProfileManager> {
        &self.manager
    }

    /// Register an event callback for this role.
    ///
    /// At most one control callback per role; it becomes the delivery
    /// target for connections this instance opens.
    pub fn register_event_callback(
        &self,
        control: bool,
        callback: EventCallback,
    ) -> PmResult<CallbackId> {
        self.manager
            .register_event_callback(self.role.callback_role(), control, callback)
    }

    pub fn unregister_event_callback(&self, id: CallbackId) -> PmResult<()> {
        self.manager.unregister_event_callback(id)
    }

    /// The control callback for this role, required for any
    /// connection-mutating call.
    fn control_callback(&self) -> PmResult<EventCallback> {
        self.manager
            .control_callback(self.role.callback_role())
            .ok_or_else(|| {
                PmError::InvalidOperation(format!(
                    "no control callback registered for {:?}",
                    self.role
                ))
            })
    }

    /// Open a service-level connection to the remote device.
    ///
    /// Events go to this role's control callback, which must already be
    /// registered.
    pub fn connect_device(&self, remote: BdAddr, port: u8, flags: ConnectFlags) -> PmResult<()> {
        let callback = self.control_callback()?;
        info!(role = ?self.role, %remote, port, "hands-free connect");
        self.manager.connect(remote, port, flags, callback)
    }

    /// Open a service-level connection and block until it resolves.
    pub fn connect_device_sync(
        &self,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
    ) -> PmResult<ConnectionStatus> {
        let callback = self.control_callback()?;
        self.manager.connect_sync(remote, port, flags, callback)
    }

    pub fn disconnect_device(&self, remote: BdAddr) -> PmResult<()> {
        self.control_callback()?;
        self.manager.disconnect(self.manager.local_client(), remote)
    }

    /// Register the role's inbound server endpoint.
    pub fn register_server(
        &self,
        port: u8,
        capabilities: u32,
        policy: IncomingPolicy,
        service_name: &str,
    ) -> PmResult<ServerId> {
        let callback = self.control_callback()?;
        self.manager.register_server(
            self.manager.local_client(),
            Some(callback),
            port,
            capabilities,
            policy,
            service_name,
        )
    }

    pub fn unregister_server(&self, server_id: ServerId) -> PmResult<()> {
        self.control_callback()?;
        self.manager
            .unregister_server(self.manager.local_client(), server_id)
    }

    /// Accept or reject an inbound open awaiting authorization.
    pub fn connection_request_response(
        &self,
        connection_id: ConnectionId,
        accept: bool,
    ) -> PmResult<()> {
        self.control_callback()?;
        self.manager.connection_request_response(
            self.manager.local_client(),
            connection_id,
            accept,
        )
    }
}
