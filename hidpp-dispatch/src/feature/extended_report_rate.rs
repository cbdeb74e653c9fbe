//! Implements the ExtendedAdjustableReportRate feature (ID `0x8061`).

use lazy_static::lazy_static;

use super::{Category, FeatureModel, FunctionApi, VersionApi, message};
use crate::{
    bitfield::BitField,
    error::Result,
    frame::HIDPP_HEADER,
    record::{Layout, Record},
};

pub const FEATURE_ID: u16 = 0x8061;

pub const GET_DEVICE_CAPABILITIES: u8 = 0;
pub const GET_ACTUAL_REPORT_RATE_LIST: u8 = 1;
pub const GET_REPORT_RATE: u8 = 2;
pub const SET_REPORT_RATE: u8 = 3;

pub const REPORT_RATE_INFO_EVENT: u8 = 0;

lazy_static! {
    static ref EXTENDED_REPORT_RATE: Layout =
        Layout::extend(&HIDPP_HEADER, "ExtendedAdjustableReportRate", &[]).for_feature(FEATURE_ID);

    static ref CONNECTION_INFO: [BitField; 2] = [
        BitField::new(0xfa, 8, "connection_type").title("Connection Type"),
        BitField::new(0xf9, 16, "padding"),
    ];

    static ref REPORT_RATE_INFO: [BitField; 2] = [
        BitField::new(0xfa, 16, "report_rate_list").title("Report Rate List"),
        BitField::new(0xf9, 112, "padding"),
    ];

    pub static ref GET_DEVICE_CAPABILITIES_REQUEST: Layout = message(
        &EXTENDED_REPORT_RATE,
        "GetDeviceCapabilities",
        GET_DEVICE_CAPABILITIES,
        &*CONNECTION_INFO,
    );

    pub static ref GET_DEVICE_CAPABILITIES_RESPONSE: Layout = message(
        &EXTENDED_REPORT_RATE,
        "GetDeviceCapabilitiesResponse",
        GET_DEVICE_CAPABILITIES,
        &*REPORT_RATE_INFO,
    );

    pub static ref GET_ACTUAL_REPORT_RATE_LIST_REQUEST: Layout = message(
        &EXTENDED_REPORT_RATE,
        "GetActualReportRateList",
        GET_ACTUAL_REPORT_RATE_LIST,
        &[BitField::new(0xfa, 24, "padding")],
    );

    pub static ref GET_ACTUAL_REPORT_RATE_LIST_RESPONSE: Layout = message(
        &EXTENDED_REPORT_RATE,
        "GetActualReportRateListResponse",
        GET_ACTUAL_REPORT_RATE_LIST,
        &*REPORT_RATE_INFO,
    );

    pub static ref GET_REPORT_RATE_REQUEST: Layout = message(
        &EXTENDED_REPORT_RATE,
        "GetReportRate",
        GET_REPORT_RATE,
        &*CONNECTION_INFO,
    );

    pub static ref GET_REPORT_RATE_RESPONSE: Layout = message(&EXTENDED_REPORT_RATE, "GetReportRateResponse", GET_REPORT_RATE, &[
        BitField::new(0xfa, 8, "report_rate").title("Report Rate"),
        BitField::new(0xf9, 120, "padding"),
    ]);

    pub static ref SET_REPORT_RATE_REQUEST: Layout = message(&EXTENDED_REPORT_RATE, "SetReportRate", SET_REPORT_RATE, &[
        BitField::new(0xfa, 8, "report_rate").title("Report Rate"),
        BitField::new(0xf9, 16, "padding"),
    ]);

    pub static ref SET_REPORT_RATE_RESPONSE: Layout = message(&EXTENDED_REPORT_RATE, "SetReportRateResponse", SET_REPORT_RATE, &[
        BitField::new(0xfa, 128, "padding"),
    ]);

    pub static ref REPORT_RATE_INFO_EVENT_REPORT: Layout = message(&EXTENDED_REPORT_RATE, "ReportRateInfoEvent", REPORT_RATE_INFO_EVENT, &[
        BitField::new(0xfa, 8, "connection_type").title("Connection Type"),
        BitField::new(0xf9, 8, "report_rate").title("Report Rate"),
        BitField::new(0xf8, 112, "padding"),
    ]);

    pub static ref FEATURE: FeatureModel = FeatureModel {
        id: FEATURE_ID,
        name: "ExtendedAdjustableReportRate",
        category: Category::Gaming,
        versions: vec![VersionApi {
            version: 0,
            functions: vec![
                FunctionApi { request: &GET_DEVICE_CAPABILITIES_REQUEST, response: &GET_DEVICE_CAPABILITIES_RESPONSE },
                FunctionApi { request: &GET_ACTUAL_REPORT_RATE_LIST_REQUEST, response: &GET_ACTUAL_REPORT_RATE_LIST_RESPONSE },
                FunctionApi { request: &GET_REPORT_RATE_REQUEST, response: &GET_REPORT_RATE_RESPONSE },
                FunctionApi { request: &SET_REPORT_RATE_REQUEST, response: &SET_REPORT_RATE_RESPONSE },
            ],
            events: vec![&REPORT_RATE_INFO_EVENT_REPORT],
        }],
    };
}

/// Report rates as numbered by the feature. The report rate list is a bit
/// mask over these values, bit `n` standing for rate `n`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ReportRate {
    Hz125,
    Hz250,
    Hz500,
    Hz1000,
    Hz2000,
    Hz4000,
    Hz8000,
}

impl ReportRate {
    const ALL: [ReportRate; 7] = [
        Self::Hz125,
        Self::Hz250,
        Self::Hz500,
        Self::Hz1000,
        Self::Hz2000,
        Self::Hz4000,
        Self::Hz8000,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn hertz(self) -> u32 {
        125 << self.index()
    }
}

/// Decodes a `report_rate_list` mask into the rates it marks as available.
pub fn report_rate_list(record: &Record) -> Result<Vec<ReportRate>> {
    let mask = record.get("report_rate_list")? as u16;

    Ok(ReportRate::ALL
        .into_iter()
        .filter(|rate| mask & (1 << rate.index()) != 0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_list_mask() {
        let record = Record::new(&GET_DEVICE_CAPABILITIES_RESPONSE)
            .with("report_rate_list", 0b0100_1001)
            .unwrap();

        assert_eq!(report_rate_list(&record).unwrap(), vec![
            ReportRate::Hz125,
            ReportRate::Hz1000,
            ReportRate::Hz8000,
        ]);
        assert_eq!(ReportRate::Hz8000.hertz(), 8000);
        assert_eq!(ReportRate::from_index(7), None);
    }

    #[test]
    fn requests_stay_short() {
        let frame = Record::new(&SET_REPORT_RATE_REQUEST)
            .with("report_rate", ReportRate::Hz1000.index().into())
            .and_then(|r| r.to_frame(false))
            .unwrap();
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), 7);
        assert_eq!(bytes[3] >> 4, SET_REPORT_RATE);
        assert_eq!(bytes[4], 3);
    }
}
