//! Phone Book Access client (PCE) surface.
//!
//! A thin typed layer over the shared profile manager: it names the
//! phonebook operations, builds the query descriptors, and enforces the
//! object-name conventions before anything reaches the engine.

use crate::types::{
    PathChange, PullListingRequest, PullPhonebookRequest, PullVcardRequest, VCARD_SUFFIX,
};
use btpm_common::event::Operation;
use btpm_common::flags::ConnectFlags;
use btpm_common::status::ConnectionStatus;
use btpm_common::{BdAddr, PmError, PmResult};
use btpm_core::dispatch::EventCallback;
use btpm_core::manager::ProfileManager;
use std::sync::Arc;
use tracing::debug;

/// Client-side access to remote phonebook servers.
pub struct PbapClient {
    manager: Arc<ProfileManager>,
}

impl PbapClient {
    pub fn new(manager: Arc<ProfileManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ProfileManager> {
        &self.manager
    }

    /// Open a connection to the phonebook server on `remote`.
    pub fn connect(
        &self,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
        callback: EventCallback,
    ) -> PmResult<()> {
        self.manager.connect(remote, port, flags, callback)
    }

    /// Open a connection and block until the attempt resolves.
    pub fn connect_sync(
        &self,
        remote: BdAddr,
        port: u8,
        flags: ConnectFlags,
        callback: EventCallback,
    ) -> PmResult<ConnectionStatus> {
        self.manager.connect_sync(remote, port, flags, callback)
    }

    pub fn disconnect(&self, remote: BdAddr) -> PmResult<()> {
        self.manager.disconnect(self.manager.local_client(), remote)
    }

    /// Abort the request in progress on the connection to `remote`.
    pub fn abort(&self, remote: BdAddr) -> PmResult<()> {
        self.manager.abort(self.manager.local_client(), remote)
    }

    /// Pull a whole phonebook object.
    pub fn pull_phonebook(&self, remote: BdAddr, request: &PullPhonebookRequest) -> PmResult<()> {
        if !request.object_name.ends_with(VCARD_SUFFIX) {
            return Err(PmError::InvalidParameter(format!(
                "phonebook object {:?} must end with {VCARD_SUFFIX}",
                request.object_name
            )));
        }
        debug!(%remote, object = %request.object_name, "pull phonebook");
        self.manager.query(
            self.manager.local_client(),
            remote,
            Operation::PullList,
            request.to_params(),
        )
    }

    /// Pull only the entry count of a phonebook object.
    pub fn pull_phonebook_size(&self, remote: BdAddr, object_name: &str) -> PmResult<()> {
        if !object_name.ends_with(VCARD_SUFFIX) {
            return Err(PmError::InvalidParameter(format!(
                "phonebook object {object_name:?} must end with {VCARD_SUFFIX}"
            )));
        }
        let request = PullPhonebookRequest {
            object_name: object_name.to_string(),
            ..PullPhonebookRequest::default()
        };
        self.manager.query(
            self.manager.local_client(),
            remote,
            Operation::PullListSize,
            request.to_params(),
        )
    }

    /// Pull the vCard listing of a folder.
    pub fn pull_vcard_listing(&self, remote: BdAddr, request: &PullListingRequest) -> PmResult<()> {
        self.manager.query(
            self.manager.local_client(),
            remote,
            Operation::PullEntryListing,
            request.to_params(),
        )
    }

    /// Pull only the entry count of a folder listing.
    pub fn pull_vcard_listing_size(&self, remote: BdAddr, folder: Option<&str>) -> PmResult<()> {
        let request = PullListingRequest {
            folder: folder.map(str::to_string),
            ..PullListingRequest::default()
        };
        self.manager.query(
            self.manager.local_client(),
            remote,
            Operation::PullEntryListingSize,
            request.to_params(),
        )
    }

    /// Pull a single vCard by name.
    pub fn pull_vcard(&self, remote: BdAddr, request: &PullVcardRequest) -> PmResult<()> {
        if !request.name.ends_with(VCARD_SUFFIX) {
            return Err(PmError::InvalidParameter(format!(
                "vCard name {:?} must end with {VCARD_SUFFIX}",
                request.name
            )));
        }
        self.manager.query(
            self.manager.local_client(),
            remote,
            Operation::PullEntry,
            request.to_params(),
        )
    }

    /// Change the current folder by a single step.
    pub fn set_phonebook(&self, remote: BdAddr, change: &PathChange) -> PmResult<()> {
        self.manager.query(
            self.manager.local_client(),
            remote,
            Operation::SetPath,
            change.to_params(),
        )
    }

    /// Change the current folder to an absolute path, walking the
    /// intermediate steps internally.
    pub fn set_phonebook_absolute(&self, remote: BdAddr, path: &str) -> PmResult<()> {
        self.manager
            .set_path_absolute(self.manager.local_client(), remote, path)
    }

    /// The current remote folder.
    pub fn current_path(&self, remote: BdAddr) -> PmResult<String> {
        self.manager.current_path(remote)
    }
}
