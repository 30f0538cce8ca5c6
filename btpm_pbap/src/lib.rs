//! btpm Phone Book Access Library
//!
//! The Phone Book Access profile adapter: typed client (PCE) and server
//! (PSE) surfaces over the shared profile manager core, plus the profile's
//! wire constants (store paths, property filters, formats, orders).
//!
//! # Module Structure
//!
//! - [`types`] - Wire constants and typed request parameters
//! - [`client`] - Client-side access to remote phonebook servers
//! - [`server`] - Registered phonebook server endpoints

pub mod client;
pub mod server;
pub mod types;

pub use client::PbapClient;
pub use server::PbapServer;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PathChange, PullPhonebookRequest, PullVcardRequest, paths};
    use btpm_common::BdAddr;
    use btpm_common::PmError;
    use btpm_common::event::Operation;
    use btpm_common::flags::{ConnectFlags, IncomingPolicy};
    use btpm_common::ids::{ConnectionId, SessionId};
    use btpm_common::status::ResponseStatus;
    use btpm_core::dispatch::EventCallback;
    use btpm_core::engine::EngineEvent;
    use btpm_core::mailbox::WorkItem;
    use btpm_core::manager::ProfileManager;
    use btpm_core::sim::{SimDevice, SimEngine, SimTransport};
    use crossbeam_channel::{Receiver, Sender, unbounded};
    use std::sync::Arc;

    fn fixture() -> (Arc<ProfileManager>, Sender<WorkItem>, Receiver<WorkItem>) {
        let (tx, rx) = unbounded::<WorkItem>();
        let engine = SimEngine::new(tx.clone(), 1024);
        let manager = Arc::new(ProfileManager::new(
            "pbap",
            Box::new(engine),
            Box::new(SimDevice::new()),
            Arc::new(SimTransport::new()) as _,
        ));
        manager.initialize(tx.clone()).unwrap();
        (manager, tx, rx)
    }

    fn pump(manager: &ProfileManager, rx: &Receiver<WorkItem>) {
        while let Ok(item) = rx.try_recv() {
            manager.process_work(item);
        }
    }

    fn noop_callback() -> EventCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn pull_requires_vcf_suffix() {
        let (manager, _tx, rx) = fixture();
        let client = PbapClient::new(Arc::clone(&manager));
        let remote = BdAddr([1, 2, 3, 4, 5, 6]);
        client
            .connect(remote, 19, ConnectFlags::empty(), noop_callback())
            .unwrap();
        pump(&manager, &rx);

        let bad = PullPhonebookRequest {
            object_name: format!("{}/{}", paths::TELECOM, paths::PHONEBOOK),
            ..PullPhonebookRequest::default()
        };
        assert!(matches!(
            client.pull_phonebook(remote, &bad),
            Err(PmError::InvalidParameter(_))
        ));
        assert!(matches!(
            client.pull_vcard(
                remote,
                &PullVcardRequest {
                    name: "0".into(),
                    ..PullVcardRequest::default()
                }
            ),
            Err(PmError::InvalidParameter(_))
        ));

        let good = PullPhonebookRequest {
            object_name: "telecom/pb.vcf".into(),
            ..PullPhonebookRequest::default()
        };
        client.pull_phonebook(remote, &good).unwrap();
    }

    #[test]
    fn single_step_path_change_updates_current_path() {
        let (manager, _tx, rx) = fixture();
        let client = PbapClient::new(Arc::clone(&manager));
        let remote = BdAddr([1, 2, 3, 4, 5, 6]);
        client
            .connect(remote, 19, ConnectFlags::empty(), noop_callback())
            .unwrap();
        pump(&manager, &rx);

        client
            .set_phonebook(remote, &PathChange::Down(paths::TELECOM.into()))
            .unwrap();
        pump(&manager, &rx);
        assert_eq!(client.current_path(remote).unwrap(), "telecom");

        client.set_phonebook(remote, &PathChange::Up).unwrap();
        pump(&manager, &rx);
        assert_eq!(client.current_path(remote).unwrap(), "");
    }

    #[test]
    fn server_register_respond_unregister() {
        let (manager, tx, rx) = fixture();
        let server = PbapServer::register(
            Arc::clone(&manager),
            19,
            crate::types::CAPABILITY_DOWNLOAD,
            IncomingPolicy::empty(),
            "Phonebook Access PSE",
            noop_callback(),
        )
        .unwrap();
        assert_eq!(manager.server_count(), 1);

        let connection_id = ConnectionId(5);
        tx.send(WorkItem::Engine(EngineEvent::OpenRequestIndication {
            port: 19,
            session: SessionId(30),
            connection_id,
            remote: BdAddr([9, 9, 9, 9, 9, 9]),
        }))
        .unwrap();
        tx.send(WorkItem::Engine(EngineEvent::OpenIndication {
            connection_id,
            remote: BdAddr([9, 9, 9, 9, 9, 9]),
        }))
        .unwrap();
        tx.send(WorkItem::Engine(EngineEvent::RequestIndication {
            connection_id,
            op: Operation::PullListSize,
            params: Default::default(),
        }))
        .unwrap();
        pump(&manager, &rx);

        server
            .send_response(
                connection_id,
                Operation::PullListSize,
                ResponseStatus::Success,
                Some(42),
                Vec::new(),
                true,
            )
            .unwrap();

        server.unregister().unwrap();
        assert_eq!(manager.server_count(), 0);
    }

    #[test]
    fn set_path_response_rejects_body() {
        let (manager, _tx, _rx) = fixture();
        let server = PbapServer::register(
            Arc::clone(&manager),
            19,
            0,
            IncomingPolicy::empty(),
            "PSE",
            noop_callback(),
        )
        .unwrap();
        assert!(matches!(
            server.send_response(
                ConnectionId(1),
                Operation::SetPath,
                ResponseStatus::Success,
                None,
                b"body".to_vec(),
                true,
            ),
            Err(PmError::InvalidParameter(_))
        ));
        server.unregister().unwrap();
    }
}
