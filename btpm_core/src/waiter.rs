//! Synchronous-connect waiter.
//!
//! A cloneable one-shot slot a blocked connect call parks on while the event
//! worker drives the attempt. The worker signals the final status after
//! releasing the manager lock, so a waiter never blocks event processing.

use btpm_common::status::ConnectionStatus;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// One-shot status slot shared between a blocked connect caller and the
/// event worker. The first signalled status wins; later signals are ignored.
#[derive(Clone)]
pub struct ConnectionWaiter {
    inner: Arc<(Mutex<Option<ConnectionStatus>>, Condvar)>,
}

impl ConnectionWaiter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// Publish the connection outcome and wake every parked caller.
    pub fn signal(&self, status: ConnectionStatus) {
        let (slot, condvar) = &*self.inner;
        let mut guard = slot.lock();
        if guard.is_none() {
            *guard = Some(status);
        }
        condvar.notify_all();
    }

    /// Block until a status has been signalled.
    pub fn wait(&self) -> ConnectionStatus {
        let (slot, condvar) = &*self.inner;
        let mut guard = slot.lock();
        loop {
            if let Some(status) = *guard {
                return status;
            }
            condvar.wait(&mut guard);
        }
    }

    /// Non-blocking peek, used by teardown sweeps and tests.
    pub fn peek(&self) -> Option<ConnectionStatus> {
        *self.inner.0.lock()
    }
}

impl Default for ConnectionWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWaiter")
            .field("status", &self.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_signalled_status() {
        let waiter = ConnectionWaiter::new();
        let remote = waiter.clone();
        let handle = thread::spawn(move || remote.wait());
        thread::sleep(Duration::from_millis(10));
        waiter.signal(ConnectionStatus::Success);
        assert_eq!(handle.join().unwrap(), ConnectionStatus::Success);
    }

    #[test]
    fn first_signal_wins() {
        let waiter = ConnectionWaiter::new();
        waiter.signal(ConnectionStatus::Refused);
        waiter.signal(ConnectionStatus::Success);
        assert_eq!(waiter.wait(), ConnectionStatus::Refused);
    }

    #[test]
    fn wait_after_signal_does_not_block() {
        let waiter = ConnectionWaiter::new();
        waiter.signal(ConnectionStatus::DevicePowerOff);
        assert_eq!(waiter.wait(), ConnectionStatus::DevicePowerOff);
        assert_eq!(waiter.peek(), Some(ConnectionStatus::DevicePowerOff));
    }
}
