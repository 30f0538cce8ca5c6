//! Outbound connection registry.

use crate::dispatch::EventCallback;
use crate::path::PathCursor;
use crate::waiter::ConnectionWaiter;
use btpm_common::event::{Operation, QueryParams};
use btpm_common::flags::{ConnectFlags, EntryFlags};
use btpm_common::ids::{ClientId, SessionId};
use btpm_common::{BdAddr, ConnectionState, PmError, PmResult};
use std::collections::HashMap;
use std::fmt;

/// State for one outbound profile connection.
pub struct ConnectionEntry {
    pub remote: BdAddr,
    pub port: u8,
    /// Engine session handle, bound once the protocol-level open is issued.
    pub session: Option<SessionId>,
    /// Owning client (the manager's own address for local callers).
    pub client: ClientId,
    /// Local delivery target; `None` for IPC-owned entries.
    pub callback: Option<EventCallback>,
    pub state: ConnectionState,
    pub flags: EntryFlags,
    pub connect_flags: ConnectFlags,
    /// The operation in flight on this connection, if any.
    pub current_op: Operation,
    /// Arguments of the in-flight query, kept for recovery and reporting.
    pub last_params: Option<QueryParams>,
    /// Current remote folder, relative to the store root.
    pub current_path: String,
    /// Cursor for an in-flight absolute path change.
    pub pending_path: Option<PathCursor>,
    /// Parked synchronous connect caller, if any.
    pub waiter: Option<ConnectionWaiter>,
}

impl ConnectionEntry {
    pub fn new(remote: BdAddr, port: u8, client: ClientId, connect_flags: ConnectFlags) -> Self {
        Self {
            remote,
            port,
            session: None,
            client,
            callback: None,
            state: ConnectionState::Idle,
            flags: EntryFlags::empty(),
            connect_flags,
            current_op: Operation::None,
            last_params: None,
            current_path: String::new(),
            pending_path: None,
            waiter: None,
        }
    }

    /// True if events for this entry go to a local callback.
    pub fn is_local(&self) -> bool {
        self.flags.contains(EntryFlags::LOCALLY_HANDLED)
    }
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("remote", &self.remote)
            .field("port", &self.port)
            .field("session", &self.session)
            .field("client", &self.client)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("current_op", &self.current_op)
            .field("current_path", &self.current_path)
            .finish_non_exhaustive()
    }
}

/// Registry of outbound connections, one per remote device.
///
/// Keyed by remote address; a secondary index maps engine session ids back
/// to addresses once a session is bound. Security-phase entries have no
/// session yet and are only reachable by address.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: HashMap<BdAddr, ConnectionEntry>,
    by_session: HashMap<SessionId, BdAddr>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. At most one outbound connection per remote
    /// device; a duplicate is rejected.
    pub fn insert(&mut self, entry: ConnectionEntry) -> PmResult<()> {
        if self.entries.contains_key(&entry.remote) {
            return Err(PmError::AlreadyConnected(entry.remote));
        }
        if let Some(session) = entry.session {
            self.by_session.insert(session, entry.remote);
        }
        self.entries.insert(entry.remote, entry);
        Ok(())
    }

    /// Bind an engine session to an existing entry and index it.
    pub fn bind_session(&mut self, remote: BdAddr, session: SessionId) -> PmResult<()> {
        let entry = self
            .entries
            .get_mut(&remote)
            .ok_or(PmError::NotConnected(remote))?;
        entry.session = Some(session);
        self.by_session.insert(session, remote);
        Ok(())
    }

    pub fn find(&self, remote: BdAddr) -> Option<&ConnectionEntry> {
        self.entries.get(&remote)
    }

    pub fn find_mut(&mut self, remote: BdAddr) -> Option<&mut ConnectionEntry> {
        self.entries.get_mut(&remote)
    }

    pub fn find_by_session_mut(&mut self, session: SessionId) -> Option<&mut ConnectionEntry> {
        let remote = *self.by_session.get(&session)?;
        self.entries.get_mut(&remote)
    }

    /// Remove and return the entry for `remote`, unindexing its session.
    pub fn remove(&mut self, remote: BdAddr) -> Option<ConnectionEntry> {
        let entry = self.entries.remove(&remote)?;
        if let Some(session) = entry.session {
            self.by_session.remove(&session);
        }
        Some(entry)
    }

    pub fn remove_by_session(&mut self, session: SessionId) -> Option<ConnectionEntry> {
        let remote = self.by_session.remove(&session)?;
        self.entries.remove(&remote)
    }

    /// Remove every entry, for teardown sweeps.
    pub fn drain(&mut self) -> Vec<ConnectionEntry> {
        self.by_session.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConnectionEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
