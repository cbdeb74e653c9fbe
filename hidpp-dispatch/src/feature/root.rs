//! Implements the Root feature (ID `0x0000`) that every device supports by
//! default.
//!
//! Root is always found at feature index `0x00`. It maps feature IDs to the
//! indices a device assigned them and answers the protocol version ping.

use lazy_static::lazy_static;

use super::{Category, FeatureModel, FeatureType, FunctionApi, VersionApi, message};
use crate::{
    bitfield::{BitField, Check},
    error::Result,
    frame::{HIDPP_HEADER, fields},
    record::{Layout, Record},
};

pub const FEATURE_ID: u16 = 0x0000;

/// Root lives at this index on every HID++2.0 device.
pub const FEATURE_INDEX: u8 = 0x00;

pub const GET_FEATURE: u8 = 0;
pub const GET_PROTOCOL_VERSION: u8 = 1;

lazy_static! {
    static ref ROOT: Layout = Layout::extend(&HIDPP_HEADER, "Root", &[]).for_feature(FEATURE_ID);

    pub static ref GET_FEATURE_REQUEST: Layout = message(&ROOT, "GetFeature", GET_FEATURE, &[
        BitField::new(0xfa, 16, "feature_id").title("Feature Id").checks(&[Check::Bytes(2)]),
        BitField::new(0xf9, 8, "padding").title("Padding"),
    ]);

    static ref GET_FEATURE_FLAGS: Layout = Layout::extend(&ROOT, "GetFeatureResponse", &[
        BitField::new(0xfa, 8, "feat_index").title("Feature Index"),
        BitField::new(0xf9, 1, "obsl").title("Obsolete"),
        BitField::new(0xf8, 1, "hidden").title("Hidden"),
        BitField::new(0xf7, 1, "eng").title("Engineering"),
    ]);

    pub static ref GET_FEATURE_RESPONSE_V0: Layout = message(&GET_FEATURE_FLAGS, "GetFeatureResponseV0", GET_FEATURE, &[
        BitField::new(0xf6, 5, "reserved").title("Reserved"),
        BitField::new(0xf5, 112, "padding").title("Padding"),
    ]);

    pub static ref GET_FEATURE_RESPONSE_V1: Layout = message(&GET_FEATURE_FLAGS, "GetFeatureResponseV1", GET_FEATURE, &[
        BitField::new(0xf6, 5, "reserved").title("Reserved"),
        BitField::new(0xf5, 8, "feat_ver").title("Feature Version"),
        BitField::new(0xf4, 104, "padding").title("Padding"),
    ]);

    pub static ref GET_FEATURE_RESPONSE_V2: Layout = message(&GET_FEATURE_FLAGS, "GetFeatureResponseV2", GET_FEATURE, &[
        BitField::new(0xf6, 1, "manuf_deact").title("Manufacturing Deactivatable"),
        BitField::new(0xf5, 1, "compl_deact").title("Compliance Deactivatable"),
        BitField::new(0xf4, 3, "reserved").title("Reserved"),
        BitField::new(0xf3, 8, "feat_ver").title("Feature Version"),
        BitField::new(0xf2, 104, "padding").title("Padding"),
    ]);

    pub static ref GET_PROTOCOL_VERSION_REQUEST: Layout = message(&ROOT, "GetProtocolVersion", GET_PROTOCOL_VERSION, &[
        BitField::new(0xfa, 16, "zero").title("Zero"),
        BitField::new(0xf9, 8, "ping_data").title("Ping Data"),
    ]);

    pub static ref GET_PROTOCOL_VERSION_RESPONSE: Layout = message(&ROOT, "GetProtocolVersionResponse", GET_PROTOCOL_VERSION, &[
        BitField::new(0xfa, 8, "protocol_num").title("Protocol Number"),
        BitField::new(0xf9, 8, "target_sw").title("Target Software"),
        BitField::new(0xf8, 8, "ping_data").title("Ping Data"),
        BitField::new(0xf7, 104, "padding").title("Padding"),
    ]);

    pub static ref FEATURE: FeatureModel = FeatureModel {
        id: FEATURE_ID,
        name: "Root",
        category: Category::Important,
        versions: [&*GET_FEATURE_RESPONSE_V0, &*GET_FEATURE_RESPONSE_V1, &*GET_FEATURE_RESPONSE_V2]
            .into_iter()
            .enumerate()
            .map(|(version, get_feature_response)| VersionApi {
                version: version as u8,
                functions: vec![
                    FunctionApi { request: &GET_FEATURE_REQUEST, response: get_feature_response },
                    FunctionApi { request: &GET_PROTOCOL_VERSION_REQUEST, response: &GET_PROTOCOL_VERSION_RESPONSE },
                ],
                events: Vec::new(),
            })
            .collect(),
    };
}

/// Builds a `GetFeature` request looking up `feature_id`.
pub fn get_feature(device_index: u8, feature_id: u16) -> Result<Record> {
    Record::new(&GET_FEATURE_REQUEST)
        .with(fields::DEVICE_INDEX, device_index.into())?
        .with("feature_id", feature_id.into())
}

/// Builds a `GetProtocolVersion` request carrying `data` as ping payload.
pub fn ping(device_index: u8, data: u8) -> Result<Record> {
    Record::new(&GET_PROTOCOL_VERSION_REQUEST)
        .with(fields::DEVICE_INDEX, device_index.into())?
        .with("ping_data", data.into())
}

/// Represents information about a specific feature as returned by the
/// `GetFeature` function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureInformation {
    /// The index of the feature in the feature table. `0` means the feature is
    /// not supported, unless the Root feature itself was looked up.
    pub index: u8,

    /// The type of the feature.
    pub typ: FeatureType,

    /// The latest supported version of the feature.
    ///
    /// Devices implementing Root version 0 do not report feature versions; the
    /// value is `0` for them.
    pub version: u8,
}

impl FeatureInformation {
    /// Reads a `GetFeature` response of any Root version.
    pub fn from_record(record: &Record) -> Result<Self> {
        let flag = |name: &str| -> Result<bool> {
            match record.layout().field(name) {
                Some(_) => Ok(record.get(name)? != 0),
                None => Ok(false),
            }
        };

        Ok(Self {
            index: record.get("feat_index")? as u8,
            typ: FeatureType {
                obsolete: flag("obsl")?,
                hidden: flag("hidden")?,
                engineering: flag("eng")?,
                manufacturing_deactivatable: flag("manuf_deact")?,
                compliance_deactivatable: flag("compl_deact")?,
            },
            version: match record.layout().field("feat_ver") {
                Some(_) => record.get("feat_ver")? as u8,
                None => 0,
            },
        })
    }
}

/// The answer to a `GetProtocolVersion` request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProtocolInformation {
    pub protocol_num: u8,
    pub target_sw: u8,

    /// The echoed ping byte.
    pub ping_data: u8,
}

impl ProtocolInformation {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            protocol_num: record.get("protocol_num")? as u8,
            target_sw: record.get("target_sw")? as u8,
            ping_data: record.get("ping_data")? as u8,
        })
    }
}
