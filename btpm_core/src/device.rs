//! Device-layer control trait and events.
//!
//! The device layer owns the local controller: power state, the protocol
//! stack handle, and link-level security. The manager issues security
//! requests through [`DeviceControl`] and receives power and security
//! outcomes as [`DeviceEvent`]s on its work queue.

use btpm_common::{BdAddr, PmResult};

/// Local controller power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// The controller is down; every connection-level operation fails.
    Off,
    /// The controller is up and the stack handle is valid.
    On,
    /// A power-down has been announced; teardown is in progress.
    PoweringOff,
}

/// Immediate result of a link security request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityOutcome {
    /// The link already satisfies the requirement; no event will follow.
    Completed,
    /// The request was queued; a [`DeviceEvent::Status`] event will follow.
    Pending,
}

/// Which out-of-band status a [`DeviceEvent::Status`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Authentication,
    Encryption,
}

/// Asynchronous device-layer events posted to the manager work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The controller came up; `stack_id` is the live stack handle.
    PoweredOn { stack_id: u32 },
    /// The controller announced an imminent power-down.
    PoweringOff,
    /// The controller is down.
    PoweredOff,
    /// A link security request finished.
    Status {
        remote: BdAddr,
        kind: StatusKind,
        success: bool,
    },
}

/// Access to the local controller.
///
/// Security requests may complete synchronously (`Completed`) when the link
/// is already secured, or asynchronously (`Pending`) with a later `Status`
/// event. Implementations must not invoke the manager re-entrantly; events
/// go through the work queue.
pub trait DeviceControl: Send {
    /// Request link authentication with the remote device.
    fn authenticate(&mut self, remote: BdAddr) -> PmResult<SecurityOutcome>;

    /// Request link encryption with the remote device.
    ///
    /// Encryption implies authentication at the link level, so a caller that
    /// needs both issues only this request.
    fn encrypt(&mut self, remote: BdAddr) -> PmResult<SecurityOutcome>;

    /// Current controller power state.
    fn query_power_state(&self) -> PowerState;

    /// The live stack handle, if the controller is up.
    fn query_stack_id(&self) -> Option<u32>;
}
