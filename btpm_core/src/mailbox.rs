//! Manager work queue.
//!
//! All asynchronous input converges on one channel drained by a single
//! worker thread, so event handling is serialized without holding any lock
//! across handler boundaries. Producers are the protocol engine, the device
//! layer, and the IPC transport.

use crate::device::DeviceEvent;
use crate::engine::EngineEvent;
use crate::ipc::IpcRequest;
use crate::manager::ProfileManager;
use btpm_common::ids::ClientId;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// One unit of work for the manager worker.
#[derive(Debug)]
pub enum WorkItem {
    /// An asynchronous protocol engine event.
    Engine(EngineEvent),
    /// An asynchronous device layer event.
    Device(DeviceEvent),
    /// A decoded client request.
    Request(IpcRequest),
    /// An IPC client disappeared; its entries must be torn down.
    ClientUnregistered(ClientId),
    /// Stop the worker.
    Shutdown,
}

/// The work queue and its worker thread.
pub struct Mailbox {
    sender: Sender<WorkItem>,
    worker: Option<JoinHandle<()>>,
}

impl Mailbox {
    /// Start the worker over an externally created channel.
    ///
    /// The channel is created first so event sources (the engine, the
    /// device layer) can hold the sender before the manager exists.
    pub fn spawn(
        manager: Arc<ProfileManager>,
        sender: Sender<WorkItem>,
        receiver: Receiver<WorkItem>,
    ) -> std::io::Result<Self> {
        let worker = std::thread::Builder::new()
            .name(format!("{}-worker", manager.profile()))
            .spawn(move || {
                debug!("manager worker started");
                for item in receiver.iter() {
                    if matches!(item, WorkItem::Shutdown) {
                        break;
                    }
                    manager.process_work(item);
                }
                info!("manager worker stopped");
            })?;
        Ok(Self {
            sender,
            worker: Some(worker),
        })
    }

    /// A producer handle for the queue.
    pub fn sender(&self) -> Sender<WorkItem> {
        self.sender.clone()
    }

    /// Stop the worker and wait for it to drain.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            if self.sender.send(WorkItem::Shutdown).is_err() {
                warn!("worker already gone at shutdown");
            }
            if worker.join().is_err() {
                warn!("manager worker panicked");
            }
        }
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.stop();
    }
}
