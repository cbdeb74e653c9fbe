//! Implements the AdjustableDpi feature (ID `0x2201`).

use lazy_static::lazy_static;

use super::{Category, FeatureModel, FunctionApi, VersionApi, message};
use crate::{
    bitfield::{BitField, Check},
    channel::Channel,
    error::Result,
    frame::HIDPP_HEADER,
    record::{Layout, Record},
};

pub const FEATURE_ID: u16 = 0x2201;

pub const GET_SENSOR_COUNT: u8 = 0;
pub const GET_SENSOR_DPI_LIST: u8 = 1;
pub const GET_SENSOR_DPI: u8 = 2;
pub const SET_SENSOR_DPI: u8 = 3;
pub const GET_NUMBER_OF_DPI_LEVELS: u8 = 4;

pub const MIN_DPI: u16 = 0x0001;
pub const MAX_DPI: u16 = 0xdfff;

/// DPI list words starting with these bits describe a step to the next entry
/// instead of a DPI value.
const DPI_STEP_MARKER: u16 = 0xe000;

const DPI_CHECKS: &[Check] = &[Check::Range {
    min: MIN_DPI as u128,
    max: MAX_DPI as u128,
}];

lazy_static! {
    static ref ADJUSTABLE_DPI: Layout =
        Layout::extend(&HIDPP_HEADER, "AdjustableDpi", &[]).for_feature(FEATURE_ID);

    pub static ref GET_SENSOR_COUNT_REQUEST: Layout = message(&ADJUSTABLE_DPI, "GetSensorCount", GET_SENSOR_COUNT, &[
        BitField::new(0xfa, 24, "padding"),
    ]);

    pub static ref GET_SENSOR_COUNT_RESPONSE: Layout = message(&ADJUSTABLE_DPI, "GetSensorCountResponse", GET_SENSOR_COUNT, &[
        BitField::new(0xfa, 8, "sensor_count").title("Sensor Count"),
        BitField::new(0xf9, 120, "padding"),
    ]);

    pub static ref GET_SENSOR_DPI_LIST_REQUEST: Layout = message(&ADJUSTABLE_DPI, "GetSensorDpiList", GET_SENSOR_DPI_LIST, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "padding"),
    ]);

    pub static ref GET_SENSOR_DPI_LIST_RESPONSE: Layout = message(&ADJUSTABLE_DPI, "GetSensorDpiListResponse", GET_SENSOR_DPI_LIST, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 120, "dpi_list").title("DPI List"),
    ]);

    pub static ref GET_SENSOR_DPI_REQUEST: Layout = message(&ADJUSTABLE_DPI, "GetSensorDpi", GET_SENSOR_DPI, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "padding"),
    ]);

    pub static ref GET_SENSOR_DPI_RESPONSE_V0: Layout = message(&ADJUSTABLE_DPI, "GetSensorDpiResponseV0", GET_SENSOR_DPI, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "dpi").title("DPI"),
        BitField::new(0xf8, 104, "padding"),
    ]);

    pub static ref GET_SENSOR_DPI_RESPONSE_V1: Layout = message(&ADJUSTABLE_DPI, "GetSensorDpiResponseV1", GET_SENSOR_DPI, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "dpi").title("DPI"),
        BitField::new(0xf8, 16, "default_dpi").title("Default DPI"),
        BitField::new(0xf7, 88, "padding"),
    ]);

    static ref SET_SENSOR_DPI_BASE: Layout = Layout::extend(&ADJUSTABLE_DPI, "SetSensorDpi", &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "dpi").title("DPI").default_value(MIN_DPI as u128).checks(DPI_CHECKS),
    ]);

    pub static ref SET_SENSOR_DPI_REQUEST_V0: Layout =
        message(&SET_SENSOR_DPI_BASE, "SetSensorDpiV0", SET_SENSOR_DPI, &[]);

    pub static ref SET_SENSOR_DPI_REQUEST_V2: Layout = message(&SET_SENSOR_DPI_BASE, "SetSensorDpiV2", SET_SENSOR_DPI, &[
        BitField::new(0xf8, 8, "dpi_level").title("DPI Level"),
        BitField::new(0xf7, 96, "padding"),
    ]);

    pub static ref SET_SENSOR_DPI_RESPONSE_V0: Layout = message(&ADJUSTABLE_DPI, "SetSensorDpiResponseV0", SET_SENSOR_DPI, &[
        BitField::new(0xfa, 128, "padding"),
    ]);

    pub static ref SET_SENSOR_DPI_RESPONSE_V1: Layout = message(&ADJUSTABLE_DPI, "SetSensorDpiResponseV1", SET_SENSOR_DPI, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "dpi").title("DPI"),
        BitField::new(0xf7, 104, "padding"),
    ]);

    pub static ref SET_SENSOR_DPI_RESPONSE_V2: Layout = message(&ADJUSTABLE_DPI, "SetSensorDpiResponseV2", SET_SENSOR_DPI, &[
        BitField::new(0xfa, 8, "sensor_idx").title("Sensor Index"),
        BitField::new(0xf9, 16, "dpi").title("DPI"),
        BitField::new(0xf8, 8, "dpi_level").title("DPI Level"),
        BitField::new(0xf7, 96, "padding"),
    ]);

    pub static ref GET_NUMBER_OF_DPI_LEVELS_REQUEST: Layout = message(&ADJUSTABLE_DPI, "GetNumberOfDpiLevels", GET_NUMBER_OF_DPI_LEVELS, &[
        BitField::new(0xfa, 24, "padding"),
    ]);

    pub static ref GET_NUMBER_OF_DPI_LEVELS_RESPONSE: Layout = message(&ADJUSTABLE_DPI, "GetNumberOfDpiLevelsResponse", GET_NUMBER_OF_DPI_LEVELS, &[
        BitField::new(0xfa, 8, "dpi_levels").title("DPI Levels"),
        BitField::new(0xf9, 120, "padding"),
    ]);

    pub static ref FEATURE: FeatureModel = {
        let common = [
            FunctionApi { request: &GET_SENSOR_COUNT_REQUEST, response: &GET_SENSOR_COUNT_RESPONSE },
            FunctionApi { request: &GET_SENSOR_DPI_LIST_REQUEST, response: &GET_SENSOR_DPI_LIST_RESPONSE },
        ];

        FeatureModel {
            id: FEATURE_ID,
            name: "AdjustableDpi",
            category: Category::Mouse,
            versions: vec![
                VersionApi {
                    version: 0,
                    functions: [
                        &common[..],
                        &[
                            FunctionApi { request: &GET_SENSOR_DPI_REQUEST, response: &GET_SENSOR_DPI_RESPONSE_V0 },
                            FunctionApi { request: &SET_SENSOR_DPI_REQUEST_V0, response: &SET_SENSOR_DPI_RESPONSE_V0 },
                        ],
                    ]
                    .concat(),
                    events: Vec::new(),
                },
                VersionApi {
                    version: 1,
                    functions: [
                        &common[..],
                        &[
                            FunctionApi { request: &GET_SENSOR_DPI_REQUEST, response: &GET_SENSOR_DPI_RESPONSE_V1 },
                            FunctionApi { request: &SET_SENSOR_DPI_REQUEST_V0, response: &SET_SENSOR_DPI_RESPONSE_V1 },
                        ],
                    ]
                    .concat(),
                    events: Vec::new(),
                },
                VersionApi {
                    version: 2,
                    functions: [
                        &common[..],
                        &[
                            FunctionApi { request: &GET_SENSOR_DPI_REQUEST, response: &GET_SENSOR_DPI_RESPONSE_V1 },
                            FunctionApi { request: &SET_SENSOR_DPI_REQUEST_V2, response: &SET_SENSOR_DPI_RESPONSE_V2 },
                            FunctionApi {
                                request: &GET_NUMBER_OF_DPI_LEVELS_REQUEST,
                                response: &GET_NUMBER_OF_DPI_LEVELS_RESPONSE,
                            },
                        ],
                    ]
                    .concat(),
                    events: Vec::new(),
                },
            ],
        }
    };
}

/// An entry of a sensor's DPI list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DpiListEntry {
    /// A supported DPI value.
    Value(u16),

    /// Every value from the previous to the next entry in steps of this size
    /// is supported.
    Step(u16),
}

/// The DPI setting of a sensor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SensorDpi {
    pub sensor_idx: u8,
    pub dpi: u16,

    /// The default DPI of the sensor. Reported from version 1 on.
    pub default_dpi: Option<u16>,
}

impl SensorDpi {
    /// Reads a `GetSensorDpi` response of any version.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            sensor_idx: record.get("sensor_idx")? as u8,
            dpi: record.get("dpi")? as u16,
            default_dpi: match record.layout().field("default_dpi") {
                Some(_) => Some(record.get("default_dpi")? as u16),
                None => None,
            },
        })
    }
}

/// Reads the DPI list of a `GetSensorDpiList` response.
///
/// The list ends at the first zero word.
pub fn dpi_list(record: &Record) -> Result<Vec<DpiListEntry>> {
    let raw = record.get_bytes("dpi_list")?;

    Ok(raw
        .chunks_exact(2)
        .map(|word| u16::from_be_bytes([word[0], word[1]]))
        .take_while(|&word| word != 0)
        .map(|word| {
            if word & DPI_STEP_MARKER == DPI_STEP_MARKER {
                DpiListEntry::Step(word & !DPI_STEP_MARKER)
            } else {
                DpiListEntry::Value(word)
            }
        })
        .collect())
}

/// Reads the current DPI of a sensor.
pub async fn get_sensor_dpi(chan: &Channel, sensor_idx: u8) -> Result<SensorDpi> {
    let request = chan
        .request(FEATURE_ID, GET_SENSOR_DPI)
        .await?
        .with("sensor_idx", sensor_idx.into())?;

    SensorDpi::from_record(&chan.invoke(request).await?)
}

/// Sets the DPI of a sensor.
///
/// Values outside of `MIN_DPI..=MAX_DPI` are rejected before anything is
/// sent.
pub async fn set_sensor_dpi(chan: &Channel, sensor_idx: u8, dpi: u16) -> Result<Record> {
    let request = chan
        .request(FEATURE_ID, SET_SENSOR_DPI)
        .await?
        .with("sensor_idx", sensor_idx.into())?
        .with("dpi", dpi.into())?;

    chan.invoke(request).await
}
