//! Implements the FeatureSet feature (ID `0x0001`) that allow enumerating all
//! the features supported by a device.
//!
//! To collect the feature table, call `GetCount` to retrieve the amount of
//! supported features (excluding the root feature), then `GetFeatureId` for
//! every `i in 1..=count` (1-based, as the root feature cannot be queried).

use lazy_static::lazy_static;

use super::{Category, FeatureModel, FeatureType, FunctionApi, VersionApi, message};
use crate::{
    bitfield::BitField,
    channel::Channel,
    error::Result,
    frame::HIDPP_HEADER,
    record::{Layout, Record},
};

/// The protocol ID of the feature.
pub const FEATURE_ID: u16 = 0x0001;

pub const GET_COUNT: u8 = 0;
pub const GET_FEATURE_ID: u8 = 1;

lazy_static! {
    static ref FEATURE_SET: Layout =
        Layout::extend(&HIDPP_HEADER, "FeatureSet", &[]).for_feature(FEATURE_ID);

    pub static ref GET_COUNT_REQUEST: Layout = message(&FEATURE_SET, "GetCount", GET_COUNT, &[
        BitField::new(0xfa, 24, "padding").title("Padding"),
    ]);

    pub static ref GET_COUNT_RESPONSE: Layout = message(&FEATURE_SET, "GetCountResponse", GET_COUNT, &[
        BitField::new(0xfa, 8, "count").title("Count"),
        BitField::new(0xf9, 120, "padding").title("Padding"),
    ]);

    pub static ref GET_FEATURE_ID_REQUEST: Layout = message(&FEATURE_SET, "GetFeatureId", GET_FEATURE_ID, &[
        BitField::new(0xfa, 8, "feature_index_to_get").title("Feature Index"),
        BitField::new(0xf9, 16, "padding").title("Padding"),
    ]);

    static ref GET_FEATURE_ID_FLAGS: Layout = Layout::extend(&FEATURE_SET, "GetFeatureIdResponse", &[
        BitField::new(0xfa, 16, "feature_id").title("Feature Id"),
        BitField::new(0xf9, 1, "obsolete").title("Obsolete"),
        BitField::new(0xf8, 1, "sw_hidden").title("Software Hidden"),
        BitField::new(0xf7, 1, "engineering_hidden").title("Engineering Hidden"),
        BitField::new(0xf6, 5, "reserved").title("Reserved"),
    ]);

    pub static ref GET_FEATURE_ID_RESPONSE_V0: Layout = message(&GET_FEATURE_ID_FLAGS, "GetFeatureIdResponseV0", GET_FEATURE_ID, &[
        BitField::new(0xf5, 104, "padding").title("Padding"),
    ]);

    pub static ref GET_FEATURE_ID_RESPONSE_V1: Layout = message(&GET_FEATURE_ID_FLAGS, "GetFeatureIdResponseV1", GET_FEATURE_ID, &[
        BitField::new(0xf5, 8, "feature_version").title("Feature Version"),
        BitField::new(0xf4, 96, "padding").title("Padding"),
    ]);

    pub static ref FEATURE: FeatureModel = FeatureModel {
        id: FEATURE_ID,
        name: "FeatureSet",
        category: Category::Important,
        versions: [
            (0, &*GET_FEATURE_ID_RESPONSE_V0),
            (1, &*GET_FEATURE_ID_RESPONSE_V1),
            (2, &*GET_FEATURE_ID_RESPONSE_V1),
        ]
        .into_iter()
        .map(|(version, get_feature_id_response)| VersionApi {
            version,
            functions: vec![
                FunctionApi { request: &GET_COUNT_REQUEST, response: &GET_COUNT_RESPONSE },
                FunctionApi { request: &GET_FEATURE_ID_REQUEST, response: get_feature_id_response },
            ],
            events: Vec::new(),
        })
        .collect(),
    };
}

/// Represents information about a specific feature as returned by the
/// `GetFeatureId` function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureInformation {
    /// The protocol ID of the feature.
    pub id: u16,

    /// The type of the feature.
    pub typ: FeatureType,

    /// The latest supported version of the feature.
    ///
    /// This field was added in feature version 1 and will be `0` for all older
    /// versions.
    pub version: u8,
}

impl FeatureInformation {
    /// Reads a `GetFeatureId` response of any FeatureSet version.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get("feature_id")? as u16,
            typ: FeatureType {
                obsolete: record.get("obsolete")? != 0,
                hidden: record.get("sw_hidden")? != 0,
                engineering: record.get("engineering_hidden")? != 0,
                ..FeatureType::default()
            },
            version: match record.layout().field("feature_version") {
                Some(_) => record.get("feature_version")? as u8,
                None => 0,
            },
        })
    }
}

/// Enumerates the feature table of the device behind `chan`.
///
/// The returned list is ordered by feature index, starting at index 1.
pub async fn enumerate(chan: &Channel) -> Result<Vec<(u8, FeatureInformation)>> {
    let response = chan.invoke(chan.request(FEATURE_ID, GET_COUNT).await?).await?;
    let count = response.get("count")? as u8;

    let mut features = Vec::with_capacity(usize::from(count));
    for index in 1..=count {
        let request = chan
            .request(FEATURE_ID, GET_FEATURE_ID)
            .await?
            .with("feature_index_to_get", index.into())?;
        let response = chan.invoke(request).await?;
        features.push((index, FeatureInformation::from_record(&response)?));
    }

    Ok(features)
}
