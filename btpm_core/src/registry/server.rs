//! Inbound server registry.

use crate::buffer::ResponseBuffer;
use crate::dispatch::EventCallback;
use btpm_common::event::Operation;
use btpm_common::flags::IncomingPolicy;
use btpm_common::ids::{ClientId, ConnectionId, IdCounter, ServerId, ServiceHandle, SessionId};
use btpm_common::{BdAddr, ConnectionState, PmError, PmResult};
use std::collections::HashMap;
use std::fmt;

/// State for one registered inbound server endpoint.
///
/// A registration outlives its connections: when the remote side closes, the
/// connection fields reset and the entry waits for the next open.
pub struct ServerEntry {
    pub server_id: ServerId,
    /// Owning client (the manager's own address for local callers).
    pub client: ClientId,
    /// Local delivery target; `None` for IPC-owned registrations.
    pub callback: Option<EventCallback>,
    pub port: u8,
    pub capabilities: u32,
    pub policy: IncomingPolicy,
    pub service_name: String,
    /// SDP record handle, held for the life of the registration.
    pub service_handle: Option<ServiceHandle>,
    pub state: ConnectionState,
    pub session: Option<SessionId>,
    pub connection_id: Option<ConnectionId>,
    pub remote: Option<BdAddr>,
    /// The server-side operation in progress, if any.
    pub current_op: Operation,
    /// Parked response data awaiting peer continuation requests.
    pub buffer: Option<ResponseBuffer>,
}

impl ServerEntry {
    /// Reset the per-connection fields, keeping the registration.
    pub fn reset_connection(&mut self) {
        self.state = ConnectionState::Idle;
        self.session = None;
        self.connection_id = None;
        self.remote = None;
        self.current_op = Operation::None;
        self.buffer = None;
    }
}

impl fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEntry")
            .field("server_id", &self.server_id)
            .field("client", &self.client)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("connection_id", &self.connection_id)
            .field("remote", &self.remote)
            .field("current_op", &self.current_op)
            .finish_non_exhaustive()
    }
}

/// Registry of inbound server endpoints.
///
/// Keyed by server id, with secondary indexes for the handles the event
/// paths carry: server port for open indications, connection id for request
/// traffic. One registration per port.
#[derive(Default)]
pub struct ServerRegistry {
    entries: HashMap<ServerId, ServerEntry>,
    by_port: HashMap<u8, ServerId>,
    by_connection: HashMap<ConnectionId, ServerId>,
    ids: IdCounter,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new endpoint. The port must be free.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        client: ClientId,
        callback: Option<EventCallback>,
        port: u8,
        capabilities: u32,
        policy: IncomingPolicy,
        service_name: String,
        service_handle: ServiceHandle,
    ) -> PmResult<ServerId> {
        if self.by_port.contains_key(&port) {
            return Err(PmError::InvalidParameter(format!(
                "server port {port} already registered"
            )));
        }
        let server_id = ServerId(self.ids.next());
        self.by_port.insert(port, server_id);
        self.entries.insert(
            server_id,
            ServerEntry {
                server_id,
                client,
                callback,
                port,
                capabilities,
                policy,
                service_name,
                service_handle: Some(service_handle),
                state: ConnectionState::Idle,
                session: None,
                connection_id: None,
                remote: None,
                current_op: Operation::None,
                buffer: None,
            },
        );
        Ok(server_id)
    }

    pub fn find(&self, server_id: ServerId) -> Option<&ServerEntry> {
        self.entries.get(&server_id)
    }

    pub fn find_mut(&mut self, server_id: ServerId) -> Option<&mut ServerEntry> {
        self.entries.get_mut(&server_id)
    }

    pub fn find_by_port_mut(&mut self, port: u8) -> Option<&mut ServerEntry> {
        let id = *self.by_port.get(&port)?;
        self.entries.get_mut(&id)
    }

    pub fn find_by_connection_mut(&mut self, connection_id: ConnectionId) -> Option<&mut ServerEntry> {
        let id = *self.by_connection.get(&connection_id)?;
        self.entries.get_mut(&id)
    }

    /// Find the entry waiting on link security for `remote`, if any.
    pub fn find_security_pending_mut(&mut self, remote: BdAddr) -> Option<&mut ServerEntry> {
        self.entries
            .values_mut()
            .find(|e| e.remote == Some(remote) && e.state.is_security_pending())
    }

    /// Attach an inbound connection to a registration and index it.
    pub fn bind_connection(
        &mut self,
        server_id: ServerId,
        session: SessionId,
        connection_id: ConnectionId,
        remote: BdAddr,
    ) -> PmResult<()> {
        let entry = self
            .entries
            .get_mut(&server_id)
            .ok_or(PmError::InvalidServerId(server_id))?;
        entry.session = Some(session);
        entry.connection_id = Some(connection_id);
        entry.remote = Some(remote);
        self.by_connection.insert(connection_id, server_id);
        Ok(())
    }

    /// Detach the current connection, keeping the registration live.
    pub fn clear_connection(&mut self, server_id: ServerId) {
        if let Some(entry) = self.entries.get_mut(&server_id) {
            if let Some(connection_id) = entry.connection_id {
                self.by_connection.remove(&connection_id);
            }
            entry.reset_connection();
        }
    }

    /// Remove a registration entirely.
    pub fn remove(&mut self, server_id: ServerId) -> Option<ServerEntry> {
        let entry = self.entries.remove(&server_id)?;
        self.by_port.remove(&entry.port);
        if let Some(connection_id) = entry.connection_id {
            self.by_connection.remove(&connection_id);
        }
        Some(entry)
    }

    /// Remove every registration, for teardown sweeps.
    pub fn drain(&mut self) -> Vec<ServerEntry> {
        self.by_port.clear();
        self.by_connection.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(reg: &mut ServerRegistry, client: u32, port: u8) -> ServerId {
        reg.register(
            ClientId(client),
            None,
            port,
            0,
            IncomingPolicy::empty(),
            format!("server-{port}"),
            ServiceHandle(u32::from(port)),
        )
        .unwrap()
    }

    #[test]
    fn ports_are_exclusive() {
        let mut reg = ServerRegistry::new();
        register(&mut reg, 1, 19);
        let err = reg.register(
            ClientId(2),
            None,
            19,
            0,
            IncomingPolicy::empty(),
            String::new(),
            ServiceHandle(99),
        );
        assert!(matches!(err, Err(PmError::InvalidParameter(_))));
    }

    #[test]
    fn same_client_different_ports_allowed() {
        let mut reg = ServerRegistry::new();
        let a = register(&mut reg, 1, 19);
        let b = register(&mut reg, 1, 20);
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn connection_binding_and_reset() {
        let mut reg = ServerRegistry::new();
        let id = register(&mut reg, 1, 19);
        let remote = BdAddr([1, 2, 3, 4, 5, 6]);
        reg.bind_connection(id, SessionId(3), ConnectionId(8), remote)
            .unwrap();

        let entry = reg.find_by_connection_mut(ConnectionId(8)).unwrap();
        assert_eq!(entry.server_id, id);
        assert_eq!(entry.remote, Some(remote));

        reg.clear_connection(id);
        assert!(reg.find_by_connection_mut(ConnectionId(8)).is_none());
        let entry = reg.find(id).unwrap();
        assert_eq!(entry.state, ConnectionState::Idle);
        assert_eq!(entry.session, None);
        assert_eq!(entry.current_op, Operation::None);
    }

    #[test]
    fn remove_frees_the_port() {
        let mut reg = ServerRegistry::new();
        let id = register(&mut reg, 1, 19);
        let entry = reg.remove(id).unwrap();
        assert_eq!(entry.port, 19);
        // Port becomes available again.
        register(&mut reg, 2, 19);
    }

    #[test]
    fn security_pending_lookup_matches_state() {
        let mut reg = ServerRegistry::new();
        let id = register(&mut reg, 1, 19);
        let remote = BdAddr([9, 9, 9, 9, 9, 9]);
        reg.bind_connection(id, SessionId(1), ConnectionId(1), remote)
            .unwrap();
        assert!(reg.find_security_pending_mut(remote).is_none());

        reg.find_mut(id).unwrap().state = ConnectionState::Encrypting;
        assert!(reg.find_security_pending_mut(remote).is_some());
    }
}
