//! Phone Book Access wire constants and typed request parameters.

use bitflags::bitflags;
use btpm_common::event::{QueryParams, SetPathOption};
use serde::{Deserialize, Serialize};

/// Well-known phonebook store paths.
pub mod paths {
    /// Folder holding the local phonebook stores.
    pub const TELECOM: &str = "telecom";
    /// Folder holding the SIM card stores.
    pub const SIM1: &str = "SIM1";
    /// The main phonebook object below `telecom`.
    pub const PHONEBOOK: &str = "pb";
    /// Incoming call history.
    pub const INCOMING_CALL_HISTORY: &str = "ich";
    /// Outgoing call history.
    pub const OUTGOING_CALL_HISTORY: &str = "och";
    /// Missed call history.
    pub const MISSED_CALL_HISTORY: &str = "mch";
    /// Combined call history.
    pub const COMBINED_CALL_HISTORY: &str = "cch";
}

/// Suffix every pullable phonebook object name carries.
pub const VCARD_SUFFIX: &str = ".vcf";

/// `max_list_count` wire value meaning "no restriction".
pub const MAX_LIST_COUNT_NOT_RESTRICTED: u16 = 65535;

/// Server capability bits advertised in the SDP record.
pub const CAPABILITY_DOWNLOAD: u32 = 0x0001;
pub const CAPABILITY_BROWSING: u32 = 0x0002;
pub const CAPABILITY_DATABASE_ID: u32 = 0x0004;

bitflags! {
    /// vCard property filter, as carried in the application parameters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PropertyFilter: u64 {
        const VERSION  = 1 << 0;
        const FN       = 1 << 1;
        const N        = 1 << 2;
        const PHOTO    = 1 << 3;
        const BDAY     = 1 << 4;
        const ADR      = 1 << 5;
        const LABEL    = 1 << 6;
        const TEL      = 1 << 7;
        const EMAIL    = 1 << 8;
        const MAILER   = 1 << 9;
        const TZ       = 1 << 10;
        const GEO      = 1 << 11;
        const TITLE    = 1 << 12;
        const ROLE     = 1 << 13;
        const LOGO     = 1 << 14;
        const AGENT    = 1 << 15;
        const ORG      = 1 << 16;
        const NOTE     = 1 << 17;
        const REV      = 1 << 18;
        const SOUND    = 1 << 19;
        const URL      = 1 << 20;
        const UID      = 1 << 21;
        const KEY      = 1 << 22;
        const NICKNAME = 1 << 23;
        const CATEGORIES = 1 << 24;
        const PROID    = 1 << 25;
        const CLASS    = 1 << 26;
        const SORT_STRING = 1 << 27;
        const TIMESTAMP = 1 << 28;
    }
}

impl Default for PropertyFilter {
    fn default() -> Self {
        Self::empty()
    }
}

/// vCard serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VcardFormat {
    /// vCard 2.1, the default mandated by the profile.
    #[default]
    V2_1,
    /// vCard 3.0.
    V3_0,
}

impl VcardFormat {
    pub fn to_wire(self) -> u8 {
        match self {
            Self::V2_1 => 0,
            Self::V3_0 => 1,
        }
    }

    pub fn from_wire(value: u8) -> Self {
        if value == 1 { Self::V3_0 } else { Self::V2_1 }
    }
}

/// Ordering of a vCard listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListOrder {
    #[default]
    Indexed,
    Alphabetical,
    Phonetical,
}

impl ListOrder {
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Indexed => 0,
            Self::Alphabetical => 1,
            Self::Phonetical => 2,
        }
    }
}

/// Attribute a listing search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchAttribute {
    #[default]
    Name,
    Number,
    Sound,
}

impl SearchAttribute {
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Name => 0,
            Self::Number => 1,
            Self::Sound => 2,
        }
    }
}

/// Typed parameters for a phonebook pull.
#[derive(Debug, Clone, Default)]
pub struct PullPhonebookRequest {
    /// Phonebook object, e.g. `telecom/pb.vcf`.
    pub object_name: String,
    pub filter: PropertyFilter,
    pub format: VcardFormat,
    pub max_list_count: Option<u16>,
    pub list_start_offset: u16,
}

impl PullPhonebookRequest {
    pub fn to_params(&self) -> QueryParams {
        QueryParams {
            object_name: Some(self.object_name.clone()),
            filter: self.filter.bits(),
            format: Some(self.format.to_wire()),
            max_list_count: self.max_list_count,
            list_start_offset: self.list_start_offset,
            ..QueryParams::default()
        }
    }
}

/// Typed parameters for a vCard listing pull.
#[derive(Debug, Clone, Default)]
pub struct PullListingRequest {
    /// Folder to list; empty means the current folder.
    pub folder: Option<String>,
    pub order: ListOrder,
    pub search_attribute: SearchAttribute,
    pub search_value: Option<String>,
    pub max_list_count: Option<u16>,
    pub list_start_offset: u16,
}

impl PullListingRequest {
    pub fn to_params(&self) -> QueryParams {
        QueryParams {
            object_name: self.folder.clone(),
            order: Some(self.order.to_wire()),
            search_attribute: Some(self.search_attribute.to_wire()),
            search_value: self.search_value.clone(),
            max_list_count: self.max_list_count,
            list_start_offset: self.list_start_offset,
            ..QueryParams::default()
        }
    }
}

/// Typed parameters for a single vCard pull.
#[derive(Debug, Clone, Default)]
pub struct PullVcardRequest {
    /// Entry name, e.g. `0.vcf`.
    pub name: String,
    pub filter: PropertyFilter,
    pub format: VcardFormat,
}

impl PullVcardRequest {
    pub fn to_params(&self) -> QueryParams {
        QueryParams {
            object_name: Some(self.name.clone()),
            filter: self.filter.bits(),
            format: Some(self.format.to_wire()),
            ..QueryParams::default()
        }
    }
}

/// One relative path change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathChange {
    Root,
    Up,
    Down(String),
}

impl PathChange {
    pub fn to_params(&self) -> QueryParams {
        match self {
            Self::Root => QueryParams {
                path_option: Some(SetPathOption::Root),
                ..QueryParams::default()
            },
            Self::Up => QueryParams {
                path_option: Some(SetPathOption::Up),
                ..QueryParams::default()
            },
            Self::Down(name) => QueryParams {
                path_option: Some(SetPathOption::Down),
                object_name: Some(name.clone()),
                ..QueryParams::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_wire_roundtrip() {
        assert_eq!(VcardFormat::from_wire(VcardFormat::V2_1.to_wire()), VcardFormat::V2_1);
        assert_eq!(VcardFormat::from_wire(VcardFormat::V3_0.to_wire()), VcardFormat::V3_0);
        // Out-of-range collapses to the mandatory default.
        assert_eq!(VcardFormat::from_wire(7), VcardFormat::V2_1);
    }

    #[test]
    fn pull_request_maps_all_fields() {
        let request = PullPhonebookRequest {
            object_name: "telecom/pb.vcf".into(),
            filter: PropertyFilter::N | PropertyFilter::TEL,
            format: VcardFormat::V3_0,
            max_list_count: Some(100),
            list_start_offset: 10,
        };
        let params = request.to_params();
        assert_eq!(params.object_name.as_deref(), Some("telecom/pb.vcf"));
        assert_eq!(params.filter, (PropertyFilter::N | PropertyFilter::TEL).bits());
        assert_eq!(params.format, Some(1));
        assert_eq!(params.max_list_count, Some(100));
        assert_eq!(params.list_start_offset, 10);
    }

    #[test]
    fn unrestricted_list_count_is_the_wire_maximum() {
        let request = PullListingRequest {
            max_list_count: Some(MAX_LIST_COUNT_NOT_RESTRICTED),
            ..PullListingRequest::default()
        };
        assert_eq!(request.to_params().max_list_count, Some(u16::MAX));
    }

    #[test]
    fn path_change_params() {
        let down = PathChange::Down(paths::TELECOM.into()).to_params();
        assert_eq!(down.path_option, Some(SetPathOption::Down));
        assert_eq!(down.object_name.as_deref(), Some("telecom"));
        assert_eq!(PathChange::Up.to_params().path_option, Some(SetPathOption::Up));
        assert!(PathChange::Root.to_params().object_name.is_none());
    }
}
