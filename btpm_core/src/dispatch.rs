//! Event dispatch.
//!
//! Handlers run under the manager lock and only accumulate [`Outbound`]
//! items; the dispatcher delivers them after the lock is released. Local
//! callbacks run behind a panic boundary so a faulting client callback
//! cannot take down the event worker; remote clients get the event
//! serialized over the IPC transport.

use crate::ipc::{IpcMessage, IpcTransport};
use crate::waiter::ConnectionWaiter;
use btpm_common::event::ProfileEvent;
use btpm_common::ids::{CallbackId, ClientId, IdCounter};
use btpm_common::status::ConnectionStatus;
use btpm_common::{PmError, PmResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A locally-registered event sink.
pub type EventCallback = Arc<dyn Fn(&ProfileEvent) + Send + Sync>;

/// Profile-defined callback role (the Hands-Free adapter distinguishes
/// hands-free from audio-gateway registrations; Phone Book Access uses one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackRole(pub u8);

struct CallbackRegistration {
    role: CallbackRole,
    control: bool,
    callback: EventCallback,
}

#[derive(Default)]
struct CallbackTable {
    entries: HashMap<CallbackId, CallbackRegistration>,
    ids: IdCounter,
}

/// One deferred delivery, produced under the manager lock.
pub enum Outbound {
    /// Invoke a local callback with the event.
    Local {
        callback: EventCallback,
        event: ProfileEvent,
    },
    /// Serialize the event toward an IPC client.
    Remote {
        client: ClientId,
        event: ProfileEvent,
    },
    /// Wake a parked synchronous connect caller.
    Wake {
        waiter: ConnectionWaiter,
        status: ConnectionStatus,
    },
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { event, .. } => write!(f, "Local({})", event.kind()),
            Self::Remote { client, event } => write!(f, "Remote({client}, {})", event.kind()),
            Self::Wake { status, .. } => write!(f, "Wake({status:?})"),
        }
    }
}

/// Delivers accumulated outbound items and owns the local callback table.
pub struct Dispatcher {
    transport: Arc<dyn IpcTransport>,
    callbacks: Mutex<CallbackTable>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn IpcTransport>) -> Self {
        Self {
            transport,
            callbacks: Mutex::new(CallbackTable::default()),
        }
    }

    /// The manager's own IPC address.
    pub fn server_address(&self) -> ClientId {
        self.transport.server_address()
    }

    pub fn transport(&self) -> &Arc<dyn IpcTransport> {
        &self.transport
    }

    /// Register a local event callback.
    ///
    /// At most one control callback per role; the control callback is the
    /// delivery target attached to entries created through the local API.
    pub fn register_callback(
        &self,
        role: CallbackRole,
        control: bool,
        callback: EventCallback,
    ) -> PmResult<CallbackId> {
        let mut table = self.callbacks.lock();
        if control
            && table
                .entries
                .values()
                .any(|r| r.role == role && r.control)
        {
            return Err(PmError::InvalidOperation(format!(
                "control callback already registered for role {}",
                role.0
            )));
        }
        let id = CallbackId(table.ids.next());
        table.entries.insert(
            id,
            CallbackRegistration {
                role,
                control,
                callback,
            },
        );
        Ok(id)
    }

    /// Remove a registered callback. Returns false for an unknown id.
    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        self.callbacks.lock().entries.remove(&id).is_some()
    }

    /// The control callback registered for `role`, if any.
    pub fn control_callback(&self, role: CallbackRole) -> Option<EventCallback> {
        self.callbacks
            .lock()
            .entries
            .values()
            .find(|r| r.role == role && r.control)
            .map(|r| Arc::clone(&r.callback))
    }

    /// Deliver every accumulated item.
    ///
    /// Must be called with no manager lock held: local callbacks may call
    /// back into the manager, and waiter wakeups unblock threads that will.
    pub fn deliver_all(&self, items: Vec<Outbound>) {
        for item in items {
            match item {
                Outbound::Local { callback, event } => Self::deliver_local(&callback, &event),
                Outbound::Remote { client, event } => self.deliver_remote(client, &event),
                Outbound::Wake { waiter, status } => waiter.signal(status),
            }
        }
    }

    fn deliver_local(callback: &EventCallback, event: &ProfileEvent) {
        debug!(kind = event.kind(), "delivering event to local callback");
        let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
        if result.is_err() {
            error!(kind = event.kind(), "event callback panicked; event dropped");
        }
    }

    fn deliver_remote(&self, client: ClientId, event: &ProfileEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(err) => {
                error!(%client, kind = event.kind(), %err, "failed to encode event");
                return;
            }
        };
        let message = IpcMessage {
            target: client,
            message_id: self.transport.next_message_id(),
            payload,
        };
        debug!(%client, kind = event.kind(), "delivering event to client");
        if let Err(err) = self.transport.send(message) {
            warn!(%client, kind = event.kind(), %err, "event delivery failed; dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::WorkItem;
    use crossbeam_channel::Sender;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<IpcMessage>>,
        ids: AtomicU32,
    }

    impl IpcTransport for RecordingTransport {
        fn send(&self, message: IpcMessage) -> PmResult<()> {
            self.sent.lock().push(message);
            Ok(())
        }

        fn server_address(&self) -> ClientId {
            ClientId(1)
        }

        fn next_message_id(&self) -> u32 {
            self.ids.fetch_add(1, Ordering::Relaxed) + 1
        }

        fn register_message_handler(&self, _queue: Sender<WorkItem>) -> PmResult<()> {
            Ok(())
        }

        fn unregister_message_handler(&self) {}
    }

    fn dispatcher() -> (Arc<RecordingTransport>, Dispatcher) {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(Arc::clone(&transport) as Arc<dyn IpcTransport>);
        (transport, dispatcher)
    }

    #[test]
    fn one_control_callback_per_role() {
        let (_, d) = dispatcher();
        let cb: EventCallback = Arc::new(|_| {});
        d.register_callback(CallbackRole(0), true, Arc::clone(&cb))
            .unwrap();
        assert!(d.register_callback(CallbackRole(0), true, Arc::clone(&cb)).is_err());
        // Non-control and other-role registrations still work.
        d.register_callback(CallbackRole(0), false, Arc::clone(&cb))
            .unwrap();
        d.register_callback(CallbackRole(1), true, cb).unwrap();
    }

    #[test]
    fn unregister_frees_the_control_slot() {
        let (_, d) = dispatcher();
        let cb: EventCallback = Arc::new(|_| {});
        let id = d
            .register_callback(CallbackRole(0), true, Arc::clone(&cb))
            .unwrap();
        assert!(d.control_callback(CallbackRole(0)).is_some());
        assert!(d.unregister_callback(id));
        assert!(!d.unregister_callback(id));
        assert!(d.control_callback(CallbackRole(0)).is_none());
        d.register_callback(CallbackRole(0), true, cb).unwrap();
    }

    #[test]
    fn panicking_callback_does_not_poison_delivery() {
        let (transport, d) = dispatcher();
        let panicking: EventCallback = Arc::new(|_| panic!("client bug"));
        let event = ProfileEvent::Aborted {
            remote: btpm_common::BdAddr::NULL,
        };
        d.deliver_all(vec![
            Outbound::Local {
                callback: panicking,
                event: event.clone(),
            },
            Outbound::Remote {
                client: ClientId(42),
                event,
            },
        ]);
        // The remote delivery after the panicking local one still happened.
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, ClientId(42));
    }

    #[test]
    fn remote_delivery_serializes_the_event() {
        let (transport, d) = dispatcher();
        let event = ProfileEvent::Aborted {
            remote: btpm_common::BdAddr([1, 2, 3, 4, 5, 6]),
        };
        d.deliver_all(vec![Outbound::Remote {
            client: ClientId(7),
            event: event.clone(),
        }]);
        let sent = transport.sent.lock();
        let decoded: ProfileEvent = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(sent[0].message_id, 1);
    }

    #[test]
    fn wake_signals_the_waiter() {
        let (_, d) = dispatcher();
        let waiter = ConnectionWaiter::new();
        d.deliver_all(vec![Outbound::Wake {
            waiter: waiter.clone(),
            status: ConnectionStatus::Refused,
        }]);
        assert_eq!(waiter.wait(), ConnectionStatus::Refused);
    }
}
