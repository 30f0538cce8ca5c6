//! The profile connection manager.
//!
//! One `ProfileManager` instance per profile. All mutable state lives in a
//! single context behind one lock; event handlers mutate it and accumulate
//! [`Outbound`] deliveries, which the dispatcher performs after the lock is
//! released. Asynchronous input (engine, device, IPC) arrives serialized
//! through the work queue, so handlers never race each other.

use crate::device::{DeviceControl, DeviceEvent, PowerState, SecurityOutcome, StatusKind};
use crate::dispatch::{CallbackRole, Dispatcher, EventCallback, Outbound};
use crate::engine::{EngineEvent, ProtocolEngine};
use crate::ipc::{IpcRequest, IpcTransport};
use crate::mailbox::WorkItem;
use crate::path::{PathCursor, PathStep, SingleStep, apply_step};
use crate::registry::{ConnectionEntry, ConnectionRegistry, ServerRegistry};
use crate::security::{
    self, SecurityAction, inbound_action, outbound_action, pending_state, post_authorization_action,
};
use crate::waiter::ConnectionWaiter;
use btpm_common::event::{Operation, ProfileEvent, QueryParams, SetPathOption};
use btpm_common::flags::{ConnectFlags, EntryFlags, IncomingPolicy};
use btpm_common::ids::{CallbackId, ClientId, ConnectionId, ServerId, SessionId};
use btpm_common::status::{ConnectionStatus, DisconnectReason, ResponseStatus};
use btpm_common::{BdAddr, ConnectionState, PmError, PmResult};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything mutable, behind the one manager lock.
struct ManagerState {
    initialized: bool,
    power: PowerState,
    stack_id: Option<u32>,
    engine: Box<dyn ProtocolEngine>,
    device: Box<dyn DeviceControl>,
    connections: ConnectionRegistry,
    servers: ServerRegistry,
}

/// A profile connection manager instance.
pub struct ProfileManager {
    profile: &'static str,
    state: Mutex<ManagerState>,
    dispatcher: Dispatcher,
}

impl ProfileManager {
    pub fn new(
        profile: &'static str,
        engine: Box<dyn ProtocolEngine>,
        device: Box<dyn DeviceControl>,
        transport: Arc<dyn IpcTransport>,
    ) -> Self {
        Self {
            profile,
            state: Mutex::new(ManagerState {
                initialized: false,
                power: PowerState::Off,
                stack_id: None,
                engine,
                device,
                connections: ConnectionRegistry::new(),
                servers: ServerRegistry::new(),
            }),
            dispatcher: Dispatcher::new(transport),
        }
    }

    /// Short profile name, used for logging and thread naming.
    pub fn profile(&self) -> &'static str {
        self.profile
    }

    /// The manager's own IPC address; entries owned by it are local.
    pub fn local_client(&self) -> ClientId {
        self.dispatcher.server_address()
    }

    // ─── Lock helpers ────────────────────────────────────────────────────

    fn guard(&self) -> PmResult<MutexGuard<'_, ManagerState>> {
        let state = self.state.lock();
        if !state.initialized {
            return Err(PmError::NotInitialized);
        }
        Ok(state)
    }

    fn check_power(state: &ManagerState) -> PmResult<()> {
        if state.power != PowerState::On {
            return Err(PmError::PoweredDown);
        }
        Ok(())
    }

    /// Build the delivery item for an entry's owner.
    fn outbound_for(
        &self,
        client: ClientId,
        callback: &Option<EventCallback>,
        event: ProfileEvent,
    ) -> Option<Outbound> {
        if client == self.local_client() {
            match callback {
                Some(callback) => Some(Outbound::Local {
                    callback: Arc::clone(callback),
                    event,
                }),
                None => {
                    warn!(kind = event.kind(), "local entry without callback; event dropped");
                    None
                }
            }
        } else {
            Some(Outbound::Remote { client, event })
        }
    }

    // ─── Callback registration ───────────────────────────────────────────

    /// Register a local event callback for `role`.
    pub fn register_event_callback(
        &self,
        role: CallbackRole,
        control: bool,
        callback: EventCallback,
    ) -> PmResult<CallbackId> {
        let _state = self.guard()?;
        self.dispatcher.register_callback(role, control, callback)
    }

    /// Remove a registered callback.
    pub fn unregister_event_callback(&self, id: CallbackId) -> PmResult<()> {
        let _state = self.guard()?;
        if self.dispatcher.unregister_callback(id) {
            Ok(())
        } else {
            Err(PmError::InvalidParameter(format!("unknown callback id {id}")))
        }
    }

    /// The control callback registered for `role`, if any.
    pub fn control_callback(&self, role: CallbackRole) -> Option<EventCallback> {
        self.dispatcher.control_callback(role)
    }

    // ─── Outbound connections ────────────────────────────────────────────

    /// Start an outbound connection owned by a local callback.
    pub fn connect(
        &self,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
        callback: EventCallback,
    ) -> PmResult<()> {
        self.connect_internal(self.local_client(), Some(callback), remote, port, flags, false)
            .map(|_| ())
    }

    /// Connect and block until the attempt resolves.
    ///
    /// The calling thread parks on a waiter while the event worker drives
    /// the attempt; on failure the caller removes the entry itself.
    pub fn connect_sync(
        &self,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
        callback: EventCallback,
    ) -> PmResult<ConnectionStatus> {
        let waiter = self
            .connect_internal(self.local_client(), Some(callback), remote, port, flags, true)?
            .ok_or(PmError::UnableToConnect)?;
        let status = waiter.wait();
        if !status.is_success() {
            let mut state = self.state.lock();
            state.connections.remove(remote);
        }
        Ok(status)
    }

    fn connect_internal(
        &self,
        client: ClientId,
        callback: Option<EventCallback>,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
        sync: bool,
    ) -> PmResult<Option<ConnectionWaiter>> {
        let mut state = self.guard()?;
        if remote.is_null() {
            return Err(PmError::InvalidParameter("null device address".into()));
        }
        if port == 0 {
            return Err(PmError::InvalidParameter("zero server port".into()));
        }
        if client == self.local_client() && callback.is_none() {
            return Err(PmError::InvalidParameter("local connect requires a callback".into()));
        }
        Self::check_power(&state)?;
        if state.connections.find(remote).is_some() {
            return Err(PmError::AlreadyConnected(remote));
        }

        let mut entry = ConnectionEntry::new(remote, port, client, flags);
        entry.callback = callback;
        if client == self.local_client() {
            entry.flags.insert(EntryFlags::LOCALLY_HANDLED);
        }
        let waiter = if sync {
            let waiter = ConnectionWaiter::new();
            entry.flags.insert(EntryFlags::SYNCHRONOUS_CONNECT);
            entry.waiter = Some(waiter.clone());
            Some(waiter)
        } else {
            None
        };

        match outbound_action(flags) {
            SecurityAction::AcceptNow => {
                let session = state.engine.open(remote, port).map_err(|err| {
                    warn!(%remote, port, %err, "engine refused outbound open");
                    PmError::UnableToConnect
                })?;
                entry.session = Some(session);
                entry.state = ConnectionState::Connecting;
            }
            action @ (SecurityAction::Encrypt | SecurityAction::Authenticate) => {
                let outcome = match action {
                    SecurityAction::Encrypt => state.device.encrypt(remote),
                    _ => state.device.authenticate(remote),
                }
                .map_err(|err| {
                    warn!(%remote, %err, "link security request failed");
                    PmError::UnableToConnect
                })?;
                match outcome {
                    SecurityOutcome::Completed => {
                        let session = state.engine.open(remote, port).map_err(|err| {
                            warn!(%remote, port, %err, "engine refused outbound open");
                            PmError::UnableToConnect
                        })?;
                        entry.session = Some(session);
                        entry.state = ConnectionState::Connecting;
                    }
                    SecurityOutcome::Pending => {
                        entry.state = pending_state(action);
                    }
                }
            }
            SecurityAction::Authorize => unreachable!("outbound connects never authorize"),
        }

        info!(profile = self.profile, %remote, port, state = %entry.state, "outbound connect started");
        state.connections.insert(entry)?;
        Ok(waiter)
    }

    /// Close the outbound connection to `remote`.
    pub fn disconnect(&self, client: ClientId, remote: BdAddr) -> PmResult<()> {
        let outbound;
        {
            let mut state = self.guard()?;
            Self::check_power(&state)?;
            let entry = state
                .connections
                .find(remote)
                .ok_or(PmError::NotConnected(remote))?;
            if entry.client != client {
                return Err(PmError::InvalidClient);
            }
            match entry.session {
                Some(session) => {
                    state.engine.close_session(session).map_err(|err| {
                        warn!(%remote, %err, "engine refused close");
                        PmError::UnableToDisconnect
                    })?;
                    let entry = state.connections.find_mut(remote).unwrap_or_else(|| unreachable!());
                    entry.flags.insert(EntryFlags::CLOSING);
                    outbound = None;
                }
                None => {
                    // Still in a security phase; nothing protocol-level to
                    // close. Tear down immediately.
                    let entry = state.connections.remove(remote).unwrap_or_else(|| unreachable!());
                    outbound = match entry.waiter {
                        Some(waiter) => Some(Outbound::Wake {
                            waiter,
                            status: ConnectionStatus::Refused,
                        }),
                        None => self.outbound_for(
                            entry.client,
                            &entry.callback,
                            ProfileEvent::Disconnected {
                                remote,
                                reason: DisconnectReason::Normal,
                            },
                        ),
                    };
                }
            }
        }
        self.dispatcher.deliver_all(outbound.into_iter().collect());
        Ok(())
    }

    /// Abort the operation in progress on the connection to `remote`.
    pub fn abort(&self, client: ClientId, remote: BdAddr) -> PmResult<()> {
        let mut state = self.guard()?;
        Self::check_power(&state)?;
        let entry = state
            .connections
            .find(remote)
            .ok_or(PmError::NotConnected(remote))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        if entry.current_op == Operation::None {
            return Err(PmError::InvalidOperation("no operation in progress".into()));
        }
        if entry.flags.contains(EntryFlags::PENDING_ABORT) {
            return Err(PmError::InvalidOperation("abort already pending".into()));
        }
        let session = entry.session.ok_or(PmError::NotConnected(remote))?;
        state.engine.abort(session).map_err(|err| {
            warn!(%remote, %err, "engine refused abort");
            PmError::InvalidOperation("unable to submit abort".into())
        })?;
        let entry = state.connections.find_mut(remote).unwrap_or_else(|| unreachable!());
        entry.flags.insert(EntryFlags::PENDING_ABORT);
        debug!(%remote, "abort pending");
        Ok(())
    }

    /// Submit a client-side query on the connection to `remote`.
    ///
    /// One operation at a time per connection; a second submission while one
    /// is in flight is rejected.
    pub fn query(
        &self,
        client: ClientId,
        remote: BdAddr,
        op: Operation,
        params: QueryParams,
    ) -> PmResult<()> {
        let mut state = self.guard()?;
        match op {
            Operation::None => {
                return Err(PmError::InvalidParameter("no operation named".into()));
            }
            Operation::SetPath if params.path_option.is_none() => {
                return Err(PmError::InvalidParameter("set-path requires a direction".into()));
            }
            Operation::PullEntry if params.object_name.is_none() => {
                return Err(PmError::InvalidParameter("pull-entry requires a name".into()));
            }
            _ => {}
        }
        Self::check_power(&state)?;
        let entry = state
            .connections
            .find(remote)
            .ok_or(PmError::NotConnected(remote))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        if entry.state != ConnectionState::Connected {
            return Err(PmError::NotConnected(remote));
        }
        if entry.current_op != Operation::None {
            return Err(PmError::InvalidOperation(format!(
                "{:?} already in progress",
                entry.current_op
            )));
        }
        let session = entry.session.ok_or(PmError::NotConnected(remote))?;
        state.engine.submit_query(session, op, &params).map_err(|err| {
            warn!(%remote, ?op, %err, "engine refused query");
            PmError::InvalidOperation("unable to submit request".into())
        })?;
        let entry = state.connections.find_mut(remote).unwrap_or_else(|| unreachable!());
        entry.current_op = op;
        if matches!(op, Operation::PullListSize | Operation::PullEntryListingSize) {
            entry.flags.insert(EntryFlags::PENDING_SIZE_QUERY);
        }
        entry.last_params = Some(params);
        debug!(%remote, ?op, "query submitted");
        Ok(())
    }

    /// Change the remote folder to an absolute path.
    ///
    /// Decomposed into single steps driven from the confirmation handler;
    /// the path-changed event fires once the final step lands.
    pub fn set_path_absolute(&self, client: ClientId, remote: BdAddr, path: &str) -> PmResult<()> {
        let mut state = self.guard()?;
        let mut cursor = PathCursor::new(path)?;
        Self::check_power(&state)?;
        let entry = state
            .connections
            .find(remote)
            .ok_or(PmError::NotConnected(remote))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        if entry.state != ConnectionState::Connected {
            return Err(PmError::NotConnected(remote));
        }
        if entry.current_op != Operation::None {
            return Err(PmError::InvalidOperation(format!(
                "{:?} already in progress",
                entry.current_op
            )));
        }
        let session = entry.session.ok_or(PmError::NotConnected(remote))?;

        // The first step always exists (reset to root).
        let step = cursor.next_step().unwrap_or(PathStep::Root);
        let params = Self::step_params(&step);
        state.engine.submit_query(session, Operation::SetPath, &params).map_err(|err| {
            warn!(%remote, path, %err, "engine refused set-path");
            PmError::InvalidOperation("unable to submit request".into())
        })?;
        let entry = state.connections.find_mut(remote).unwrap_or_else(|| unreachable!());
        entry.current_op = Operation::SetPath;
        entry.flags.insert(EntryFlags::PENDING_ABSOLUTE_PATH);
        entry.pending_path = Some(cursor);
        debug!(%remote, path, "absolute path change started");
        Ok(())
    }

    fn step_params(step: &PathStep) -> QueryParams {
        match step {
            PathStep::Root => QueryParams {
                path_option: Some(SetPathOption::Root),
                ..QueryParams::default()
            },
            PathStep::Down(name) => QueryParams {
                path_option: Some(SetPathOption::Down),
                object_name: Some(name.clone()),
                ..QueryParams::default()
            },
        }
    }

    /// Current remote folder for the connection to `remote`.
    pub fn current_path(&self, remote: BdAddr) -> PmResult<String> {
        let state = self.guard()?;
        state
            .connections
            .find(remote)
            .map(|entry| entry.current_path.clone())
            .ok_or(PmError::NotConnected(remote))
    }

    // ─── Server registrations ────────────────────────────────────────────

    /// Register an inbound server endpoint on `port`.
    pub fn register_server(
        &self,
        client: ClientId,
        callback: Option<EventCallback>,
        port: u8,
        capabilities: u32,
        policy: IncomingPolicy,
        service_name: &str,
    ) -> PmResult<ServerId> {
        let mut state = self.guard()?;
        if port == 0 {
            return Err(PmError::InvalidParameter("zero server port".into()));
        }
        if client == self.local_client() && callback.is_none() {
            return Err(PmError::InvalidParameter("local server requires a callback".into()));
        }
        Self::check_power(&state)?;
        let handle = state
            .engine
            .register_service(port, service_name, capabilities)
            .map_err(|err| {
                warn!(port, %err, "engine refused service registration");
                PmError::InvalidParameter(format!("unable to register service on port {port}"))
            })?;
        match state.servers.register(
            client,
            callback,
            port,
            capabilities,
            policy,
            service_name.to_string(),
            handle,
        ) {
            Ok(server_id) => {
                info!(profile = self.profile, %server_id, port, "server registered");
                Ok(server_id)
            }
            Err(err) => {
                // Roll the service record back; the port was already taken.
                if let Err(e) = state.engine.unregister_service(handle) {
                    error!(port, %e, "service rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Remove a server registration, closing any live connection.
    pub fn unregister_server(&self, client: ClientId, server_id: ServerId) -> PmResult<()> {
        let mut state = self.guard()?;
        let entry = state
            .servers
            .find(server_id)
            .ok_or(PmError::InvalidServerId(server_id))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        let entry = state.servers.remove(server_id).unwrap_or_else(|| unreachable!());
        if let Some(connection_id) = entry.connection_id {
            if let Err(err) = state.engine.close_connection(connection_id) {
                warn!(%server_id, %err, "close on unregister failed");
            }
        }
        if let Some(handle) = entry.service_handle {
            if let Err(err) = state.engine.unregister_service(handle) {
                warn!(%server_id, %err, "service unregistration failed");
            }
        }
        info!(profile = self.profile, %server_id, "server unregistered");
        Ok(())
    }

    /// Accept or reject an inbound open held in `Authorizing`.
    pub fn connection_request_response(
        &self,
        client: ClientId,
        connection_id: ConnectionId,
        accept: bool,
    ) -> PmResult<()> {
        let mut state = self.guard()?;
        Self::check_power(&state)?;
        let entry = state
            .servers
            .find_by_connection_mut(connection_id)
            .ok_or(PmError::InvalidConnectionId(connection_id))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        if entry.state != ConnectionState::Authorizing {
            return Err(PmError::InvalidOperation("no authorization pending".into()));
        }
        let server_id = entry.server_id;
        let policy = entry.policy;
        let remote = entry.remote;

        if !accept {
            if let Err(err) = state.engine.open_request_response(connection_id, false) {
                warn!(%connection_id, %err, "reject delivery failed");
            }
            state.servers.clear_connection(server_id);
            info!(%server_id, %connection_id, "inbound open rejected by owner");
            return Ok(());
        }

        match post_authorization_action(policy) {
            SecurityAction::AcceptNow => {
                Self::accept_inbound(&mut state, server_id, connection_id)?;
            }
            action @ (SecurityAction::Encrypt | SecurityAction::Authenticate) => {
                let remote = remote.ok_or(PmError::InvalidConnectionId(connection_id))?;
                let outcome = match action {
                    SecurityAction::Encrypt => state.device.encrypt(remote),
                    _ => state.device.authenticate(remote),
                };
                match outcome {
                    Ok(SecurityOutcome::Completed) => {
                        Self::accept_inbound(&mut state, server_id, connection_id)?;
                    }
                    Ok(SecurityOutcome::Pending) => {
                        let entry = state
                            .servers
                            .find_mut(server_id)
                            .unwrap_or_else(|| unreachable!());
                        entry.state = pending_state(action);
                    }
                    Err(err) => {
                        warn!(%remote, %err, "link security request failed");
                        if let Err(e) = state.engine.open_request_response(connection_id, false) {
                            warn!(%connection_id, %e, "reject delivery failed");
                        }
                        state.servers.clear_connection(server_id);
                        return Err(PmError::UnableToConnect);
                    }
                }
            }
            SecurityAction::Authorize => unreachable!("authorization already granted"),
        }
        Ok(())
    }

    fn accept_inbound(
        state: &mut ManagerState,
        server_id: ServerId,
        connection_id: ConnectionId,
    ) -> PmResult<()> {
        match state.engine.open_request_response(connection_id, true) {
            Ok(()) => {
                let entry = state
                    .servers
                    .find_mut(server_id)
                    .unwrap_or_else(|| unreachable!());
                entry.state = ConnectionState::Connecting;
                Ok(())
            }
            Err(err) => {
                warn!(%server_id, %connection_id, %err, "accept delivery failed");
                state.servers.clear_connection(server_id);
                Err(PmError::UnableToConnect)
            }
        }
    }

    /// Close the live inbound connection on a registration.
    pub fn close_server_connection(
        &self,
        client: ClientId,
        connection_id: ConnectionId,
    ) -> PmResult<()> {
        let mut state = self.guard()?;
        Self::check_power(&state)?;
        let entry = state
            .servers
            .find_by_connection_mut(connection_id)
            .ok_or(PmError::InvalidConnectionId(connection_id))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        state.engine.close_connection(connection_id).map_err(|err| {
            warn!(%connection_id, %err, "engine refused close");
            PmError::UnableToDisconnect
        })
    }

    /// Supply response data for the operation in progress on an inbound
    /// connection.
    ///
    /// Data beyond what the engine accepts in one packet is parked and
    /// drained on the peer's continuation requests. `final_chunk` false
    /// means the application will supply more data in a later call.
    pub fn send_response(
        &self,
        client: ClientId,
        connection_id: ConnectionId,
        op: Operation,
        status: ResponseStatus,
        size: Option<u32>,
        data: Vec<u8>,
        final_chunk: bool,
    ) -> PmResult<()> {
        let mut state = self.guard()?;
        if op == Operation::None {
            return Err(PmError::InvalidParameter("no operation named".into()));
        }
        Self::check_power(&state)?;
        let entry = state
            .servers
            .find_by_connection_mut(connection_id)
            .ok_or(PmError::InvalidConnectionId(connection_id))?;
        if entry.client != client {
            return Err(PmError::InvalidClient);
        }
        if entry.current_op != op {
            return Err(PmError::InvalidOperation(format!(
                "expected response for {:?}",
                entry.current_op
            )));
        }
        if entry.buffer.is_some() {
            return Err(PmError::InvalidOperation("previous response still draining".into()));
        }
        let server_id = entry.server_id;

        // Error responses and set-path responses carry no body.
        if !status.is_success() || op == Operation::SetPath {
            state
                .engine
                .send_response_chunk(connection_id, status, size, &[], true)
                .map_err(|err| {
                    warn!(%connection_id, %err, "engine refused response");
                    PmError::InvalidOperation("unable to submit response".into())
                })?;
            let entry = state.servers.find_mut(server_id).unwrap_or_else(|| unreachable!());
            entry.current_op = Operation::None;
            return Ok(());
        }

        let consumed = state
            .engine
            .send_response_chunk(connection_id, status, size, &data, final_chunk)
            .map_err(|err| {
                warn!(%connection_id, %err, "engine refused response");
                PmError::InvalidOperation("unable to submit response".into())
            })?;
        let entry = state.servers.find_mut(server_id).unwrap_or_else(|| unreachable!());
        if consumed < data.len() {
            let mut buffer = crate::buffer::ResponseBuffer::new(data, final_chunk);
            buffer.advance(consumed);
            entry.buffer = Some(buffer);
            debug!(%connection_id, ?op, remaining = entry.buffer.as_ref().map(|b| b.pending().len()), "response parked for continuation");
        } else if final_chunk {
            entry.current_op = Operation::None;
            debug!(%connection_id, ?op, "response complete");
        }
        // Fully consumed but not final: the operation stays open for the
        // application's next send_response call.
        Ok(())
    }

    // ─── Work queue processing ───────────────────────────────────────────

    /// Process one unit of work. Called only from the worker thread (or
    /// directly by tests).
    pub fn process_work(&self, item: WorkItem) {
        match item {
            WorkItem::Engine(event) => self.process_engine_event(event),
            WorkItem::Device(event) => self.process_device_event(event),
            WorkItem::Request(request) => self.process_request(request),
            WorkItem::ClientUnregistered(client) => self.process_client_unregistered(client),
            WorkItem::Shutdown => {}
        }
    }

    fn process_request(&self, request: IpcRequest) {
        let kind = match &request {
            IpcRequest::Connect { .. } => "connect",
            IpcRequest::Disconnect { .. } => "disconnect",
            IpcRequest::Abort { .. } => "abort",
            IpcRequest::Query { .. } => "query",
            IpcRequest::SetPathAbsolute { .. } => "set-path-absolute",
            IpcRequest::RegisterServer { .. } => "register-server",
            IpcRequest::UnregisterServer { .. } => "unregister-server",
            IpcRequest::ConnectionRequestResponse { .. } => "connection-request-response",
            IpcRequest::CloseServerConnection { .. } => "close-server-connection",
            IpcRequest::SendResponse { .. } => "send-response",
        };
        let client = request.client();
        let result = match request {
            IpcRequest::Connect {
                client,
                remote,
                port,
                flags,
            } => self
                .connect_internal(client, None, remote, port, flags, false)
                .map(|_| ()),
            IpcRequest::Disconnect { client, remote } => self.disconnect(client, remote),
            IpcRequest::Abort { client, remote } => self.abort(client, remote),
            IpcRequest::Query {
                client,
                remote,
                op,
                params,
            } => self.query(client, remote, op, params),
            IpcRequest::SetPathAbsolute {
                client,
                remote,
                path,
            } => self.set_path_absolute(client, remote, &path),
            IpcRequest::RegisterServer {
                client,
                port,
                capabilities,
                policy,
                name,
            } => self
                .register_server(client, None, port, capabilities, policy, &name)
                .map(|_| ()),
            IpcRequest::UnregisterServer { client, server_id } => {
                self.unregister_server(client, server_id)
            }
            IpcRequest::ConnectionRequestResponse {
                client,
                connection_id,
                accept,
            } => self.connection_request_response(client, connection_id, accept),
            IpcRequest::CloseServerConnection {
                client,
                connection_id,
            } => self.close_server_connection(client, connection_id),
            IpcRequest::SendResponse {
                client,
                connection_id,
                op,
                status,
                size,
                data,
                final_chunk,
            } => self.send_response(client, connection_id, op, status, size, data, final_chunk),
        };
        if let Err(err) = result {
            warn!(%client, kind, %err, "client request failed");
            // The sender still gets an answer; a request must never vanish
            // without a resolving event.
            if client != self.local_client() {
                self.dispatcher.deliver_all(vec![Outbound::Remote {
                    client,
                    event: ProfileEvent::RequestFailed {
                        request: kind.to_string(),
                        status: err.response_status(),
                    },
                }]);
            }
        }
    }

    // ─── Engine events ───────────────────────────────────────────────────

    fn process_engine_event(&self, event: EngineEvent) {
        let outbound = {
            let mut state = self.state.lock();
            if !state.initialized {
                warn!(?event, "engine event after shutdown; ignored");
                return;
            }
            match event {
                EngineEvent::OpenConfirmation {
                    remote,
                    session,
                    status,
                } => self.on_open_confirmation(&mut state, remote, session, status),
                EngineEvent::OpenRequestIndication {
                    port,
                    session,
                    connection_id,
                    remote,
                } => self.on_open_request(&mut state, port, session, connection_id, remote),
                EngineEvent::OpenIndication {
                    connection_id,
                    remote,
                } => self.on_open_indication(&mut state, connection_id, remote),
                EngineEvent::CloseIndication {
                    session,
                    connection_id,
                } => self.on_close_indication(&mut state, session, connection_id),
                EngineEvent::QueryConfirmation {
                    session,
                    op,
                    status,
                    size,
                    data,
                    final_chunk,
                } => self.on_query_confirmation(&mut state, session, op, status, size, data, final_chunk),
                EngineEvent::RequestIndication {
                    connection_id,
                    op,
                    params,
                } => self.on_request_indication(&mut state, connection_id, op, params),
                EngineEvent::AbortConfirmation { session } => {
                    self.on_abort_confirmation(&mut state, session)
                }
                EngineEvent::AbortIndication { connection_id } => {
                    self.on_abort_indication(&mut state, connection_id)
                }
            }
        };
        self.dispatcher.deliver_all(outbound);
    }

    fn on_open_confirmation(
        &self,
        state: &mut ManagerState,
        remote: BdAddr,
        session: SessionId,
        status: ConnectionStatus,
    ) -> Vec<Outbound> {
        let Some(entry) = state.connections.find_mut(remote) else {
            warn!(%remote, %session, "open confirmation for unknown connection");
            return Vec::new();
        };
        let mut outbound = Vec::new();
        if status.is_success() {
            if !entry.state.can_transition_to(ConnectionState::Connected) {
                warn!(%remote, state = %entry.state, "open confirmation in unexpected state");
                return Vec::new();
            }
            entry.state = ConnectionState::Connected;
            info!(profile = self.profile, %remote, %session, "connected");
            if let Some(waiter) = entry.waiter.take() {
                outbound.push(Outbound::Wake {
                    waiter,
                    status: ConnectionStatus::Success,
                });
            } else {
                let client = entry.client;
                let callback = entry.callback.clone();
                outbound.extend(self.outbound_for(
                    client,
                    &callback,
                    ProfileEvent::ConnectionStatus { remote, status },
                ));
                outbound.extend(self.outbound_for(
                    client,
                    &callback,
                    ProfileEvent::Connected { remote, session },
                ));
            }
        } else {
            info!(profile = self.profile, %remote, ?status, "connect failed");
            if let Some(waiter) = entry.waiter.take() {
                // The blocked caller removes the entry itself.
                outbound.push(Outbound::Wake { waiter, status });
            } else {
                let entry = state.connections.remove(remote).unwrap_or_else(|| unreachable!());
                outbound.extend(self.outbound_for(
                    entry.client,
                    &entry.callback,
                    ProfileEvent::ConnectionStatus { remote, status },
                ));
            }
        }
        outbound
    }

    fn on_open_request(
        &self,
        state: &mut ManagerState,
        port: u8,
        session: SessionId,
        connection_id: ConnectionId,
        remote: BdAddr,
    ) -> Vec<Outbound> {
        let Some(entry) = state.servers.find_by_port_mut(port) else {
            warn!(port, %remote, "inbound open for unregistered port; rejecting");
            if let Err(err) = state.engine.open_request_response(connection_id, false) {
                warn!(%connection_id, %err, "reject delivery failed");
            }
            return Vec::new();
        };
        if entry.state != ConnectionState::Idle {
            warn!(port, %remote, state = %entry.state, "server busy; rejecting inbound open");
            if let Err(err) = state.engine.open_request_response(connection_id, false) {
                warn!(%connection_id, %err, "reject delivery failed");
            }
            return Vec::new();
        }
        let server_id = entry.server_id;
        let policy = entry.policy;
        let client = entry.client;
        let callback = entry.callback.clone();
        state
            .servers
            .bind_connection(server_id, session, connection_id, remote)
            .unwrap_or_else(|_| unreachable!());

        match inbound_action(policy) {
            SecurityAction::AcceptNow => {
                let _ = Self::accept_inbound(state, server_id, connection_id);
                Vec::new()
            }
            SecurityAction::Authorize => {
                let entry = state.servers.find_mut(server_id).unwrap_or_else(|| unreachable!());
                entry.state = ConnectionState::Authorizing;
                debug!(%server_id, %remote, "inbound open awaiting authorization");
                self.outbound_for(
                    client,
                    &callback,
                    ProfileEvent::ConnectionRequest {
                        server_id,
                        connection_id,
                        remote,
                    },
                )
                .into_iter()
                .collect()
            }
            action @ (SecurityAction::Encrypt | SecurityAction::Authenticate) => {
                let outcome = match action {
                    SecurityAction::Encrypt => state.device.encrypt(remote),
                    _ => state.device.authenticate(remote),
                };
                match outcome {
                    Ok(SecurityOutcome::Completed) => {
                        let _ = Self::accept_inbound(state, server_id, connection_id);
                    }
                    Ok(SecurityOutcome::Pending) => {
                        let entry =
                            state.servers.find_mut(server_id).unwrap_or_else(|| unreachable!());
                        entry.state = pending_state(action);
                    }
                    Err(err) => {
                        warn!(%remote, %err, "link security request failed; rejecting");
                        if let Err(e) = state.engine.open_request_response(connection_id, false) {
                            warn!(%connection_id, %e, "reject delivery failed");
                        }
                        state.servers.clear_connection(server_id);
                    }
                }
                Vec::new()
            }
        }
    }

    fn on_open_indication(
        &self,
        state: &mut ManagerState,
        connection_id: ConnectionId,
        remote: BdAddr,
    ) -> Vec<Outbound> {
        let Some(entry) = state.servers.find_by_connection_mut(connection_id) else {
            warn!(%connection_id, %remote, "open indication for unknown connection");
            return Vec::new();
        };
        if !entry.state.can_transition_to(ConnectionState::Connected) {
            warn!(%connection_id, state = %entry.state, "open indication in unexpected state");
            return Vec::new();
        }
        entry.state = ConnectionState::Connected;
        let server_id = entry.server_id;
        info!(profile = self.profile, %server_id, %connection_id, %remote, "inbound connected");
        self.outbound_for(
            entry.client,
            &entry.callback.clone(),
            ProfileEvent::ServerConnected {
                server_id,
                connection_id,
                remote,
            },
        )
        .into_iter()
        .collect()
    }

    fn on_close_indication(
        &self,
        state: &mut ManagerState,
        session: SessionId,
        connection_id: Option<ConnectionId>,
    ) -> Vec<Outbound> {
        if let Some(connection_id) = connection_id {
            let Some(entry) = state.servers.find_by_connection_mut(connection_id) else {
                warn!(%connection_id, "close indication for unknown server connection");
                return Vec::new();
            };
            let server_id = entry.server_id;
            let client = entry.client;
            let callback = entry.callback.clone();
            let was_connected = entry.state == ConnectionState::Connected;
            state.servers.clear_connection(server_id);
            info!(profile = self.profile, %server_id, %connection_id, "inbound disconnected");
            if was_connected {
                return self
                    .outbound_for(
                        client,
                        &callback,
                        ProfileEvent::ServerDisconnected {
                            server_id,
                            connection_id,
                        },
                    )
                    .into_iter()
                    .collect();
            }
            return Vec::new();
        }

        let Some(entry) = state.connections.remove_by_session(session) else {
            warn!(%session, "close indication for unknown session");
            return Vec::new();
        };
        let remote = entry.remote;
        info!(profile = self.profile, %remote, %session, "disconnected");
        if let Some(waiter) = entry.waiter {
            // The connect never resolved; the close is its failure.
            return vec![Outbound::Wake {
                waiter,
                status: ConnectionStatus::Refused,
            }];
        }
        self.outbound_for(
            entry.client,
            &entry.callback,
            ProfileEvent::Disconnected {
                remote,
                reason: DisconnectReason::Normal,
            },
        )
        .into_iter()
        .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn on_query_confirmation(
        &self,
        state: &mut ManagerState,
        session: SessionId,
        op: Operation,
        status: ResponseStatus,
        size: Option<u32>,
        data: Vec<u8>,
        final_chunk: bool,
    ) -> Vec<Outbound> {
        let Some(entry) = state.connections.find_by_session_mut(session) else {
            warn!(%session, ?op, "query confirmation for unknown session");
            return Vec::new();
        };
        if entry.flags.contains(EntryFlags::PENDING_ABORT) {
            // The abort confirmation will settle the operation.
            debug!(remote = %entry.remote, ?op, "late confirmation discarded during abort");
            return Vec::new();
        }
        if entry.current_op != op {
            warn!(remote = %entry.remote, ?op, current = ?entry.current_op, "confirmation for wrong operation");
            return Vec::new();
        }
        let remote = entry.remote;
        let client = entry.client;
        let callback = entry.callback.clone();

        if op == Operation::SetPath && entry.flags.contains(EntryFlags::PENDING_ABSOLUTE_PATH) {
            return self.advance_path_cursor(state, remote, status);
        }

        if op == Operation::SetPath {
            let step = entry
                .last_params
                .as_ref()
                .and_then(|p| p.path_option)
                .map(|option| match option {
                    SetPathOption::Root => SingleStep::Root,
                    SetPathOption::Up => SingleStep::Up,
                    SetPathOption::Down => SingleStep::Down(
                        entry
                            .last_params
                            .as_ref()
                            .and_then(|p| p.object_name.clone())
                            .unwrap_or_default(),
                    ),
                });
            if status.is_success() {
                if let Some(step) = step {
                    entry.current_path = apply_step(&entry.current_path, &step);
                }
            }
            let current_path = entry.current_path.clone();
            entry.current_op = Operation::None;
            entry.last_params = None;
            return self
                .outbound_for(
                    client,
                    &callback,
                    ProfileEvent::PathChanged {
                        remote,
                        status,
                        current_path,
                    },
                )
                .into_iter()
                .collect();
        }

        // Size queries resolve to a count; a body the peer attached anyway
        // is dropped, only the size field is delivered.
        let data = if entry.flags.contains(EntryFlags::PENDING_SIZE_QUERY) {
            Vec::new()
        } else {
            data
        };
        if final_chunk || !status.is_success() {
            entry.current_op = Operation::None;
            entry.flags.remove(EntryFlags::PENDING_SIZE_QUERY);
            entry.last_params = None;
        }
        self.outbound_for(
            client,
            &callback,
            ProfileEvent::QueryComplete {
                remote,
                op,
                status,
                size,
                data,
                final_chunk,
            },
        )
        .into_iter()
        .collect()
    }

    /// Drive the next step of an in-flight absolute path change.
    fn advance_path_cursor(
        &self,
        state: &mut ManagerState,
        remote: BdAddr,
        status: ResponseStatus,
    ) -> Vec<Outbound> {
        let Some(entry) = state.connections.find_mut(remote) else {
            return Vec::new();
        };
        let client = entry.client;
        let callback = entry.callback.clone();
        let session = entry.session;

        let finish = |entry: &mut ConnectionEntry, status: ResponseStatus| {
            entry.flags.remove(EntryFlags::PENDING_ABSOLUTE_PATH);
            entry.pending_path = None;
            entry.current_op = Operation::None;
            ProfileEvent::PathChanged {
                remote,
                status,
                current_path: entry.current_path.clone(),
            }
        };

        if !status.is_success() {
            // The step just confirmed failed; the current folder is the one
            // the last successful step left.
            let event = finish(entry, status);
            warn!(%remote, ?status, "absolute path change failed");
            return self.outbound_for(client, &callback, event).into_iter().collect();
        }

        // The confirmation covers the last step handed out.
        if let Some(cursor) = entry.pending_path.as_ref() {
            entry.current_path = cursor.applied().to_string();
        }

        let next = entry.pending_path.as_mut().and_then(|cursor| cursor.next_step());
        match next {
            Some(step) => {
                let params = Self::step_params(&step);
                let Some(session) = session else {
                    let event = finish(entry, ResponseStatus::Unknown);
                    return self.outbound_for(client, &callback, event).into_iter().collect();
                };
                if let Err(err) = state.engine.submit_query(session, Operation::SetPath, &params) {
                    warn!(%remote, %err, "path step submission failed");
                    let entry = state.connections.find_mut(remote).unwrap_or_else(|| unreachable!());
                    let event = finish(entry, ResponseStatus::UnableToSubmitRequest);
                    return self.outbound_for(client, &callback, event).into_iter().collect();
                }
                Vec::new()
            }
            None => {
                let event = finish(entry, ResponseStatus::Success);
                debug!(%remote, path = %entry.current_path, "absolute path change complete");
                self.outbound_for(client, &callback, event).into_iter().collect()
            }
        }
    }

    fn on_request_indication(
        &self,
        state: &mut ManagerState,
        connection_id: ConnectionId,
        op: Operation,
        params: QueryParams,
    ) -> Vec<Outbound> {
        let Some(entry) = state.servers.find_by_connection_mut(connection_id) else {
            warn!(%connection_id, ?op, "request for unknown connection");
            return Vec::new();
        };
        let server_id = entry.server_id;
        let client = entry.client;
        let callback = entry.callback.clone();

        // A repeat of the in-progress kind is the peer asking for the next
        // chunk: drain the parked remainder if one exists, otherwise hand
        // the indication back to the application so it supplies the chunk.
        if entry.current_op == op {
            if entry.buffer.is_some() {
                Self::drain_buffer(state, server_id, connection_id);
                return Vec::new();
            }
            debug!(%server_id, %connection_id, ?op, "continuation request forwarded");
            return self
                .outbound_for(
                    client,
                    &callback,
                    ProfileEvent::RequestIndication {
                        server_id,
                        connection_id,
                        op,
                        params,
                    },
                )
                .into_iter()
                .collect();
        }

        if entry.current_op != Operation::None {
            warn!(%connection_id, ?op, current = ?entry.current_op, "overlapping request rejected");
            if let Err(err) = state.engine.send_response_chunk(
                connection_id,
                ResponseStatus::NotAcceptable,
                None,
                &[],
                true,
            ) {
                warn!(%connection_id, %err, "reject response failed");
            }
            return Vec::new();
        }

        entry.current_op = op;
        debug!(%server_id, %connection_id, ?op, "request indication");
        self.outbound_for(
            client,
            &callback,
            ProfileEvent::RequestIndication {
                server_id,
                connection_id,
                op,
                params,
            },
        )
        .into_iter()
        .collect()
    }

    /// Send the next chunk of a parked response.
    fn drain_buffer(state: &mut ManagerState, server_id: ServerId, connection_id: ConnectionId) {
        let Some(entry) = state.servers.find_mut(server_id) else {
            return;
        };
        let Some(buffer) = entry.buffer.as_ref() else {
            return;
        };
        let chunk = buffer.pending().to_vec();
        let is_final = buffer.is_final();
        match state
            .engine
            .send_response_chunk(connection_id, ResponseStatus::Success, None, &chunk, is_final)
        {
            Ok(consumed) => {
                let entry = state.servers.find_mut(server_id).unwrap_or_else(|| unreachable!());
                let buffer = entry.buffer.as_mut().unwrap_or_else(|| unreachable!());
                buffer.advance(consumed);
                if buffer.is_drained() {
                    let final_done = buffer.is_final();
                    entry.buffer = None;
                    if final_done {
                        entry.current_op = Operation::None;
                        debug!(%connection_id, "parked response fully drained");
                    }
                }
            }
            Err(err) => {
                warn!(%connection_id, %err, "continuation send failed; abandoning response");
                let entry = state.servers.find_mut(server_id).unwrap_or_else(|| unreachable!());
                entry.buffer = None;
                entry.current_op = Operation::None;
                if let Err(e) = state.engine.send_response_chunk(
                    connection_id,
                    ResponseStatus::ServiceUnavailable,
                    None,
                    &[],
                    true,
                ) {
                    warn!(%connection_id, %e, "error response failed");
                }
            }
        }
    }

    fn on_abort_confirmation(&self, state: &mut ManagerState, session: SessionId) -> Vec<Outbound> {
        let Some(entry) = state.connections.find_by_session_mut(session) else {
            warn!(%session, "abort confirmation for unknown session");
            return Vec::new();
        };
        entry.flags.remove(EntryFlags::PENDING_ABORT);
        entry.flags.remove(EntryFlags::PENDING_SIZE_QUERY);
        entry.flags.remove(EntryFlags::PENDING_ABSOLUTE_PATH);
        entry.pending_path = None;
        entry.current_op = Operation::None;
        entry.last_params = None;
        let remote = entry.remote;
        debug!(%remote, "abort complete");
        self.outbound_for(
            entry.client,
            &entry.callback.clone(),
            ProfileEvent::Aborted { remote },
        )
        .into_iter()
        .collect()
    }

    fn on_abort_indication(&self, state: &mut ManagerState, connection_id: ConnectionId) -> Vec<Outbound> {
        let Some(entry) = state.servers.find_by_connection_mut(connection_id) else {
            warn!(%connection_id, "abort indication for unknown connection");
            return Vec::new();
        };
        // Peer abandoned the operation: drop any parked data and go idle.
        entry.buffer = None;
        entry.current_op = Operation::None;
        debug!(%connection_id, "peer aborted server operation");
        Vec::new()
    }

    // ─── Device events ───────────────────────────────────────────────────

    fn process_device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::PoweredOn { stack_id } => self.on_powered_on(stack_id),
            DeviceEvent::PoweringOff => self.on_power_down(PowerState::PoweringOff),
            DeviceEvent::PoweredOff => self.on_power_down(PowerState::Off),
            DeviceEvent::Status {
                remote,
                kind,
                success,
            } => {
                let outbound = {
                    let mut state = self.state.lock();
                    if !state.initialized {
                        return;
                    }
                    self.on_security_status(&mut state, remote, kind, success)
                };
                self.dispatcher.deliver_all(outbound);
            }
        }
    }

    fn on_security_status(
        &self,
        state: &mut ManagerState,
        remote: BdAddr,
        kind: StatusKind,
        success: bool,
    ) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        // Outbound entry waiting on this status.
        if let Some(entry) = state.connections.find_mut(remote) {
            if security::status_resolves(entry.state, kind) {
                if success {
                    let port = entry.port;
                    match state.engine.open(remote, port) {
                        Ok(session) => {
                            state
                                .connections
                                .bind_session(remote, session)
                                .unwrap_or_else(|_| unreachable!());
                            let entry =
                                state.connections.find_mut(remote).unwrap_or_else(|| unreachable!());
                            entry.state = ConnectionState::Connecting;
                            debug!(%remote, "security complete; opening");
                        }
                        Err(err) => {
                            warn!(%remote, %err, "open after security failed");
                            outbound.extend(self.fail_outbound_entry(
                                state,
                                remote,
                                ConnectionStatus::Unknown,
                            ));
                        }
                    }
                } else {
                    info!(%remote, ?kind, "link security failed");
                    outbound.extend(self.fail_outbound_entry(
                        state,
                        remote,
                        ConnectionStatus::SecurityFailure,
                    ));
                }
            }
        }

        // Inbound entry waiting on this status.
        if let Some(entry) = state.servers.find_security_pending_mut(remote) {
            if security::status_resolves(entry.state, kind) {
                let server_id = entry.server_id;
                let connection_id = entry.connection_id;
                if success {
                    if let Some(connection_id) = connection_id {
                        let _ = Self::accept_inbound(state, server_id, connection_id);
                    }
                } else {
                    info!(%remote, ?kind, "inbound link security failed; rejecting");
                    if let Some(connection_id) = connection_id {
                        if let Err(err) = state.engine.open_request_response(connection_id, false) {
                            warn!(%connection_id, %err, "reject delivery failed");
                        }
                    }
                    state.servers.clear_connection(server_id);
                }
            }
        }

        outbound
    }

    /// Fail an outbound entry that never reached `Connected`.
    fn fail_outbound_entry(
        &self,
        state: &mut ManagerState,
        remote: BdAddr,
        status: ConnectionStatus,
    ) -> Vec<Outbound> {
        let Some(entry) = state.connections.find_mut(remote) else {
            return Vec::new();
        };
        if let Some(waiter) = entry.waiter.take() {
            // The blocked caller removes the entry.
            return vec![Outbound::Wake { waiter, status }];
        }
        let entry = state.connections.remove(remote).unwrap_or_else(|| unreachable!());
        self.outbound_for(
            entry.client,
            &entry.callback,
            ProfileEvent::ConnectionStatus { remote, status },
        )
        .into_iter()
        .collect()
    }

    // ─── Power and client lifecycle ──────────────────────────────────────

    fn on_powered_on(&self, stack_id: u32) {
        let mut state = self.state.lock();
        if !state.initialized {
            return;
        }
        state.power = PowerState::On;
        state.stack_id = Some(stack_id);
        info!(profile = self.profile, stack_id, "device powered on");
    }

    fn on_power_down(&self, power: PowerState) {
        let outbound = {
            let mut state = self.state.lock();
            if !state.initialized {
                return;
            }
            state.power = power;
            if power == PowerState::Off {
                state.stack_id = None;
            }
            info!(profile = self.profile, ?power, "device powering down; sweeping entries");
            self.sweep(&mut state)
        };
        self.dispatcher.deliver_all(outbound);
    }

    /// Tear down every connection and registration.
    ///
    /// Parked synchronous connect callers are woken with a power-off
    /// status; every other owner gets a disconnect event. Nothing is
    /// silently dropped.
    fn sweep(&self, state: &mut ManagerState) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for entry in state.connections.drain() {
            if let Some(session) = entry.session {
                if let Err(err) = state.engine.close_session(session) {
                    debug!(remote = %entry.remote, %err, "close during sweep failed");
                }
            }
            if let Some(waiter) = entry.waiter {
                outbound.push(Outbound::Wake {
                    waiter,
                    status: ConnectionStatus::DevicePowerOff,
                });
            } else {
                outbound.extend(self.outbound_for(
                    entry.client,
                    &entry.callback,
                    ProfileEvent::Disconnected {
                        remote: entry.remote,
                        reason: DisconnectReason::DevicePowerOff,
                    },
                ));
            }
        }
        for entry in state.servers.drain() {
            if let Some(connection_id) = entry.connection_id {
                if let Err(err) = state.engine.close_connection(connection_id) {
                    debug!(server_id = %entry.server_id, %err, "close during sweep failed");
                }
                if entry.state == ConnectionState::Connected {
                    outbound.extend(self.outbound_for(
                        entry.client,
                        &entry.callback,
                        ProfileEvent::ServerDisconnected {
                            server_id: entry.server_id,
                            connection_id,
                        },
                    ));
                }
            }
            if let Some(handle) = entry.service_handle {
                if let Err(err) = state.engine.unregister_service(handle) {
                    debug!(server_id = %entry.server_id, %err, "service unregistration failed");
                }
            }
        }
        outbound
    }

    fn process_client_unregistered(&self, client: ClientId) {
        let mut state = self.state.lock();
        if !state.initialized {
            return;
        }
        if client == self.local_client() {
            warn!("local client can not unregister");
            return;
        }
        let remotes: Vec<BdAddr> = state
            .connections
            .iter()
            .filter(|e| e.client == client)
            .map(|e| e.remote)
            .collect();
        for remote in remotes {
            if let Some(entry) = state.connections.remove(remote) {
                if let Some(session) = entry.session {
                    if let Err(err) = state.engine.close_session(session) {
                        debug!(%remote, %err, "close for dead client failed");
                    }
                }
            }
        }
        let servers: Vec<ServerId> = state
            .servers
            .iter()
            .filter(|e| e.client == client)
            .map(|e| e.server_id)
            .collect();
        for server_id in servers {
            if let Some(entry) = state.servers.remove(server_id) {
                if let Some(connection_id) = entry.connection_id {
                    if let Err(err) = state.engine.close_connection(connection_id) {
                        debug!(%server_id, %err, "close for dead client failed");
                    }
                }
                if let Some(handle) = entry.service_handle {
                    if let Err(err) = state.engine.unregister_service(handle) {
                        debug!(%server_id, %err, "service unregistration failed");
                    }
                }
            }
        }
        info!(profile = self.profile, %client, "client entries removed");
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Bring the manager up: hook the IPC transport into the work queue and
    /// capture the current power state.
    pub fn initialize(&self, queue: crossbeam_channel::Sender<WorkItem>) -> PmResult<()> {
        let mut state = self.state.lock();
        if state.initialized {
            return Err(PmError::InvalidOperation("already initialized".into()));
        }
        self.dispatcher.transport().register_message_handler(queue)?;
        state.power = state.device.query_power_state();
        state.stack_id = state.device.query_stack_id();
        state.initialized = true;
        info!(profile = self.profile, power = ?state.power, "profile manager initialized");
        Ok(())
    }

    /// Tear the manager down: detach from the transport, sweep every entry,
    /// and mark uninitialized. Idempotent.
    pub fn shutdown(&self) {
        let outbound = {
            let mut state = self.state.lock();
            if !state.initialized {
                return;
            }
            self.dispatcher.transport().unregister_message_handler();
            let outbound = self.sweep(&mut state);
            state.initialized = false;
            info!(profile = self.profile, "profile manager shut down");
            outbound
        };
        self.dispatcher.deliver_all(outbound);
    }

    // ─── Introspection for adapters and tests ────────────────────────────

    /// Connection state for `remote`, if an entry exists.
    pub fn connection_state(&self, remote: BdAddr) -> Option<ConnectionState> {
        let state = self.state.lock();
        state.connections.find(remote).map(|e| e.state)
    }

    /// Server entry state, if the registration exists.
    pub fn server_state(&self, server_id: ServerId) -> Option<ConnectionState> {
        let state = self.state.lock();
        state.servers.find(server_id).map(|e| e.state)
    }

    /// Number of live outbound connection entries.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Number of live server registrations.
    pub fn server_count(&self) -> usize {
        self.state.lock().servers.len()
    }

    /// Current power state.
    pub fn power_state(&self) -> PowerState {
        self.state.lock().power
    }

    /// The captured stack handle, if powered.
    pub fn stack_id(&self) -> Option<u32> {
        self.state.lock().stack_id
    }
}
