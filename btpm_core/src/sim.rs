//! Simulated engine, device and transport.
//!
//! In-process stand-ins for the wire layer, the controller and the IPC
//! transport. The engine answers opens and queries by posting the matching
//! events back through the work queue, with a configurable per-packet
//! acceptance limit so continuation paths are reachable. Used by the daemon
//! in simulation mode and throughout the integration tests.

use crate::device::{DeviceControl, DeviceEvent, PowerState, SecurityOutcome};
use crate::engine::{EngineEvent, ProtocolEngine};
use crate::ipc::{IpcMessage, IpcTransport};
use crate::mailbox::WorkItem;
use btpm_common::event::{Operation, QueryParams};
use btpm_common::ids::{ClientId, ConnectionId, IdCounter, ServiceHandle, SessionId};
use btpm_common::status::{ConnectionStatus, ResponseStatus};
use btpm_common::{BdAddr, PmError, PmResult};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tracing::debug;

/// A response packet the simulated engine accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentChunk {
    pub connection_id: ConnectionId,
    pub status: ResponseStatus,
    pub size: Option<u32>,
    pub data: Vec<u8>,
    pub final_chunk: bool,
}

/// Shared observation window into a [`SimEngine`], for tests.
#[derive(Default)]
pub struct SimEngineStats {
    /// Every response packet accepted, in order.
    pub chunks: Mutex<Vec<SentChunk>>,
    /// Service records released so far.
    pub services_released: AtomicUsize,
    /// Aborts submitted so far.
    pub aborts: AtomicUsize,
}

/// Simulated protocol engine.
///
/// Opens succeed and confirm asynchronously; queries confirm with empty
/// success payloads unless the test drives confirmations by hand. Response
/// packets are truncated to `max_packet` bytes.
pub struct SimEngine {
    queue: Sender<WorkItem>,
    sessions: IdCounter,
    services: IdCounter,
    /// Largest chunk accepted per response packet.
    pub max_packet: usize,
    /// When false, opens get no automatic confirmation (the test posts one).
    pub auto_confirm_open: bool,
    /// When false, queries get no automatic confirmation.
    pub auto_confirm_query: bool,
    open_ports: HashMap<SessionId, BdAddr>,
    pub stats: Arc<SimEngineStats>,
}

impl SimEngine {
    pub fn new(queue: Sender<WorkItem>, max_packet: usize) -> Self {
        Self {
            queue,
            sessions: IdCounter::new(),
            services: IdCounter::new(),
            max_packet,
            auto_confirm_open: true,
            auto_confirm_query: true,
            open_ports: HashMap::new(),
            stats: Arc::new(SimEngineStats::default()),
        }
    }

    fn post(&self, event: EngineEvent) {
        // A closed queue just drops the event, like a dead lower layer.
        let _ = self.queue.send(WorkItem::Engine(event));
    }
}

impl ProtocolEngine for SimEngine {
    fn open(&mut self, remote: BdAddr, _port: u8) -> PmResult<SessionId> {
        let session = SessionId(self.sessions.next());
        self.open_ports.insert(session, remote);
        if self.auto_confirm_open {
            self.post(EngineEvent::OpenConfirmation {
                remote,
                session,
                status: ConnectionStatus::Success,
            });
        }
        debug!(%remote, %session, "sim open");
        Ok(session)
    }

    fn open_request_response(&mut self, connection_id: ConnectionId, accept: bool) -> PmResult<()> {
        debug!(%connection_id, accept, "sim open request response");
        Ok(())
    }

    fn close_session(&mut self, session: SessionId) -> PmResult<()> {
        if self.open_ports.remove(&session).is_none() {
            return Err(PmError::UnableToDisconnect);
        }
        self.post(EngineEvent::CloseIndication {
            session,
            connection_id: None,
        });
        Ok(())
    }

    fn close_connection(&mut self, connection_id: ConnectionId) -> PmResult<()> {
        debug!(%connection_id, "sim close connection");
        Ok(())
    }

    fn abort(&mut self, session: SessionId) -> PmResult<()> {
        self.stats.aborts.fetch_add(1, Ordering::Relaxed);
        self.post(EngineEvent::AbortConfirmation { session });
        Ok(())
    }

    fn submit_query(
        &mut self,
        session: SessionId,
        op: Operation,
        _params: &QueryParams,
    ) -> PmResult<()> {
        if self.auto_confirm_query {
            self.post(EngineEvent::QueryConfirmation {
                session,
                op,
                status: ResponseStatus::Success,
                size: None,
                data: Vec::new(),
                final_chunk: true,
            });
        }
        Ok(())
    }

    fn send_response_chunk(
        &mut self,
        connection_id: ConnectionId,
        status: ResponseStatus,
        size: Option<u32>,
        chunk: &[u8],
        final_chunk: bool,
    ) -> PmResult<usize> {
        let accepted = chunk.len().min(self.max_packet);
        self.stats.chunks.lock().push(SentChunk {
            connection_id,
            status,
            size,
            data: chunk[..accepted].to_vec(),
            final_chunk: final_chunk && accepted == chunk.len(),
        });
        Ok(accepted)
    }

    fn register_service(
        &mut self,
        port: u8,
        name: &str,
        _capabilities: u32,
    ) -> PmResult<ServiceHandle> {
        debug!(port, name, "sim service registered");
        Ok(ServiceHandle(self.services.next()))
    }

    fn unregister_service(&mut self, _handle: ServiceHandle) -> PmResult<()> {
        self.stats.services_released.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Simulated controller.
///
/// Powered on with a fixed stack handle. Security requests complete
/// immediately unless `security_pending` is set, in which case the test
/// posts the status event itself.
pub struct SimDevice {
    pub power: PowerState,
    pub stack_id: u32,
    /// Security requests return `Pending` instead of completing inline.
    pub security_pending: bool,
    /// Security requests fail outright.
    pub security_rejected: bool,
}

impl SimDevice {
    pub fn new() -> Self {
        Self {
            power: PowerState::On,
            stack_id: 1,
            security_pending: false,
            security_rejected: false,
        }
    }

    fn security(&self) -> PmResult<SecurityOutcome> {
        if self.security_rejected {
            return Err(PmError::UnableToConnect);
        }
        if self.security_pending {
            Ok(SecurityOutcome::Pending)
        } else {
            Ok(SecurityOutcome::Completed)
        }
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceControl for SimDevice {
    fn authenticate(&mut self, _remote: BdAddr) -> PmResult<SecurityOutcome> {
        self.security()
    }

    fn encrypt(&mut self, _remote: BdAddr) -> PmResult<SecurityOutcome> {
        self.security()
    }

    fn query_power_state(&self) -> PowerState {
        self.power
    }

    fn query_stack_id(&self) -> Option<u32> {
        if self.power == PowerState::On {
            Some(self.stack_id)
        } else {
            None
        }
    }
}

/// Simulated IPC transport that records every outbound event message.
#[derive(Default)]
pub struct SimTransport {
    pub sent: Mutex<Vec<IpcMessage>>,
    ids: AtomicU32,
    handler_registered: Mutex<bool>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manager's own address on this transport.
    pub const LOCAL: ClientId = ClientId(1);

    pub fn handler_registered(&self) -> bool {
        *self.handler_registered.lock()
    }
}

impl IpcTransport for SimTransport {
    fn send(&self, message: IpcMessage) -> PmResult<()> {
        self.sent.lock().push(message);
        Ok(())
    }

    fn server_address(&self) -> ClientId {
        Self::LOCAL
    }

    fn next_message_id(&self) -> u32 {
        self.ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn register_message_handler(&self, _queue: Sender<WorkItem>) -> PmResult<()> {
        *self.handler_registered.lock() = true;
        Ok(())
    }

    fn unregister_message_handler(&self) {
        *self.handler_registered.lock() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn open_posts_confirmation() {
        let (tx, rx) = unbounded();
        let mut engine = SimEngine::new(tx, 64);
        let session = engine.open(BdAddr([1, 1, 1, 1, 1, 1]), 5).unwrap();
        match rx.try_recv().unwrap() {
            WorkItem::Engine(EngineEvent::OpenConfirmation {
                session: confirmed, status, ..
            }) => {
                assert_eq!(confirmed, session);
                assert_eq!(status, ConnectionStatus::Success);
            }
            other => panic!("unexpected work item {other:?}"),
        }
    }

    #[test]
    fn response_chunk_truncated_to_max_packet() {
        let (tx, _rx) = unbounded();
        let mut engine = SimEngine::new(tx, 4);
        let accepted = engine
            .send_response_chunk(
                ConnectionId(1),
                ResponseStatus::Success,
                None,
                &[0u8; 10],
                true,
            )
            .unwrap();
        assert_eq!(accepted, 4);
        let chunks = engine.stats.chunks.lock();
        assert_eq!(chunks[0].data.len(), 4);
        // Truncated packets can not be final.
        assert!(!chunks[0].final_chunk);
    }

    #[test]
    fn close_of_unknown_session_fails() {
        let (tx, _rx) = unbounded();
        let mut engine = SimEngine::new(tx, 64);
        assert_eq!(
            engine.close_session(SessionId(99)),
            Err(PmError::UnableToDisconnect)
        );
    }

    #[test]
    fn device_security_modes() {
        let mut device = SimDevice::new();
        assert_eq!(
            device.encrypt(BdAddr::NULL).unwrap(),
            SecurityOutcome::Completed
        );
        device.security_pending = true;
        assert_eq!(
            device.authenticate(BdAddr::NULL).unwrap(),
            SecurityOutcome::Pending
        );
        device.security_rejected = true;
        assert!(device.encrypt(BdAddr::NULL).is_err());
    }

    #[test]
    fn powered_off_device_has_no_stack() {
        let mut device = SimDevice::new();
        assert_eq!(device.query_stack_id(), Some(1));
        device.power = PowerState::Off;
        assert_eq!(device.query_stack_id(), None);
    }
}
