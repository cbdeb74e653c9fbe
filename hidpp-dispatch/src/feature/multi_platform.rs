//! Implements the MultiPlatform feature (ID `0x4531`).
//!
//! Keyboards use it to adapt their key layout to the operating system of the
//! host they are currently connected to.

use lazy_static::lazy_static;

use super::{Category, FeatureModel, FunctionApi, VersionApi, message};
use crate::{
    bitfield::BitField,
    error::Result,
    frame::HIDPP_HEADER,
    record::{Layout, Record},
};

pub const FEATURE_ID: u16 = 0x4531;

pub const GET_FEATURE_INFOS: u8 = 0;
pub const GET_PLATFORM_DESCRIPTOR: u8 = 1;
pub const GET_HOST_PLATFORM: u8 = 2;
pub const SET_HOST_PLATFORM: u8 = 3;

pub const PLATFORM_CHANGE_EVENT: u8 = 0;

/// `host_index` value addressing the host the device is currently connected
/// to.
pub const CURRENT_HOST: u8 = 0xff;

lazy_static! {
    static ref MULTI_PLATFORM: Layout =
        Layout::extend(&HIDPP_HEADER, "MultiPlatform", &[]).for_feature(FEATURE_ID);

    pub static ref GET_FEATURE_INFOS_REQUEST: Layout = message(&MULTI_PLATFORM, "GetFeatureInfos", GET_FEATURE_INFOS, &[
        BitField::new(0xfa, 24, "padding"),
    ]);

    pub static ref GET_FEATURE_INFOS_RESPONSE: Layout = message(&MULTI_PLATFORM, "GetFeatureInfosResponse", GET_FEATURE_INFOS, &[
        BitField::new(0xfa, 16, "capability_mask").title("Capability Mask"),
        BitField::new(0xf9, 8, "num_platforms").title("Number of Platforms"),
        BitField::new(0xf8, 8, "num_platform_descriptor").title("Number of Platform Descriptors"),
        BitField::new(0xf7, 8, "num_hosts").title("Number of Hosts"),
        BitField::new(0xf6, 8, "current_host").title("Current Host"),
        BitField::new(0xf5, 8, "current_host_platform").title("Current Host Platform"),
        BitField::new(0xf4, 72, "padding"),
    ]);

    pub static ref GET_PLATFORM_DESCRIPTOR_REQUEST: Layout = message(&MULTI_PLATFORM, "GetPlatformDescriptor", GET_PLATFORM_DESCRIPTOR, &[
        BitField::new(0xfa, 8, "platform_descriptor_index").title("Platform Descriptor Index"),
        BitField::new(0xf9, 16, "padding"),
    ]);

    static ref PLATFORM_DESCRIPTOR_FIELDS: [BitField; 8] = [
        BitField::new(0xfa, 8, "platform_index").title("Platform Index"),
        BitField::new(0xf9, 8, "platform_descriptor_index").title("Platform Descriptor Index"),
        BitField::new(0xf8, 16, "os_mask").title("OS Mask"),
        BitField::new(0xf7, 8, "from_version").title("From Version"),
        BitField::new(0xf6, 8, "from_revision").title("From Revision"),
        BitField::new(0xf5, 8, "to_version").title("To Version"),
        BitField::new(0xf4, 8, "to_revision").title("To Revision"),
        BitField::new(0xf3, 64, "padding"),
    ];

    pub static ref GET_PLATFORM_DESCRIPTOR_RESPONSE_V0: Layout = message(
        &MULTI_PLATFORM,
        "GetPlatformDescriptorResponseV0",
        GET_PLATFORM_DESCRIPTOR,
        &*PLATFORM_DESCRIPTOR_FIELDS,
    );

    /// Same bits as version 0; the OS mask gained the WebOS and Tizen flags.
    pub static ref GET_PLATFORM_DESCRIPTOR_RESPONSE_V1: Layout = message(
        &MULTI_PLATFORM,
        "GetPlatformDescriptorResponseV1",
        GET_PLATFORM_DESCRIPTOR,
        &*PLATFORM_DESCRIPTOR_FIELDS,
    );

    pub static ref GET_HOST_PLATFORM_REQUEST: Layout = message(&MULTI_PLATFORM, "GetHostPlatform", GET_HOST_PLATFORM, &[
        BitField::new(0xfa, 8, "host_index").title("Host Index"),
        BitField::new(0xf9, 16, "padding"),
    ]);

    pub static ref GET_HOST_PLATFORM_RESPONSE: Layout = message(&MULTI_PLATFORM, "GetHostPlatformResponse", GET_HOST_PLATFORM, &[
        BitField::new(0xfa, 8, "host_index").title("Host Index"),
        BitField::new(0xf9, 8, "status").title("Status"),
        BitField::new(0xf8, 8, "platform_index").title("Platform Index"),
        BitField::new(0xf7, 8, "platform_source").title("Platform Source"),
        BitField::new(0xf6, 8, "auto_platform").title("Auto Platform"),
        BitField::new(0xf5, 8, "auto_descriptor").title("Auto Descriptor"),
        BitField::new(0xf4, 80, "padding"),
    ]);

    pub static ref SET_HOST_PLATFORM_REQUEST: Layout = message(&MULTI_PLATFORM, "SetHostPlatform", SET_HOST_PLATFORM, &[
        BitField::new(0xfa, 8, "host_index").title("Host Index"),
        BitField::new(0xf9, 8, "platform_index").title("Platform Index"),
        BitField::new(0xf8, 8, "padding"),
    ]);

    pub static ref SET_HOST_PLATFORM_RESPONSE: Layout = message(&MULTI_PLATFORM, "SetHostPlatformResponse", SET_HOST_PLATFORM, &[
        BitField::new(0xfa, 8, "host_index").title("Host Index"),
        BitField::new(0xf9, 8, "platform_index").title("Platform Index"),
        BitField::new(0xf8, 112, "padding"),
    ]);

    pub static ref PLATFORM_CHANGE_EVENT_REPORT: Layout = message(&MULTI_PLATFORM, "PlatformChangeEvent", PLATFORM_CHANGE_EVENT, &[
        BitField::new(0xfa, 8, "host_index").title("Host Index"),
        BitField::new(0xf9, 8, "platform_index").title("Platform Index"),
        BitField::new(0xf8, 8, "platform_source").title("Platform Source"),
        BitField::new(0xf7, 104, "padding"),
    ]);

    pub static ref FEATURE: FeatureModel = FeatureModel {
        id: FEATURE_ID,
        name: "MultiPlatform",
        category: Category::Keyboard,
        versions: [(0, &*GET_PLATFORM_DESCRIPTOR_RESPONSE_V0), (1, &*GET_PLATFORM_DESCRIPTOR_RESPONSE_V1)]
            .into_iter()
            .map(|(version, descriptor_response)| VersionApi {
                version,
                functions: vec![
                    FunctionApi { request: &GET_FEATURE_INFOS_REQUEST, response: &GET_FEATURE_INFOS_RESPONSE },
                    FunctionApi { request: &GET_PLATFORM_DESCRIPTOR_REQUEST, response: descriptor_response },
                    FunctionApi { request: &GET_HOST_PLATFORM_REQUEST, response: &GET_HOST_PLATFORM_RESPONSE },
                    FunctionApi { request: &SET_HOST_PLATFORM_REQUEST, response: &SET_HOST_PLATFORM_RESPONSE },
                ],
                events: vec![&PLATFORM_CHANGE_EVENT_REPORT],
            })
            .collect(),
    };
}

/// Where the platform of a host was taken from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PlatformSource {
    Default,
    Auto,
    Manual,
    Software,
    Unknown(u8),
}

impl From<u8> for PlatformSource {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Default,
            1 => Self::Auto,
            2 => Self::Manual,
            3 => Self::Software,
            other => Self::Unknown(other),
        }
    }
}

/// The general capabilities reported by `GetFeatureInfos`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureInfos {
    /// Whether the host platform can be set by software.
    pub set_host_platform: bool,

    /// Whether the device detects the host OS on its own.
    pub os_detection: bool,

    pub num_platforms: u8,
    pub num_platform_descriptor: u8,
    pub num_hosts: u8,
    pub current_host: u8,
    pub current_host_platform: u8,
}

impl FeatureInfos {
    pub fn from_record(record: &Record) -> Result<Self> {
        let capabilities = record.get("capability_mask")? as u16;

        Ok(Self {
            set_host_platform: capabilities & (1 << 9) != 0,
            os_detection: capabilities & (1 << 8) != 0,
            num_platforms: record.get("num_platforms")? as u8,
            num_platform_descriptor: record.get("num_platform_descriptor")? as u8,
            num_hosts: record.get("num_hosts")? as u8,
            current_host: record.get("current_host")? as u8,
            current_host_platform: record.get("current_host_platform")? as u8,
        })
    }
}

/// A platform change reported by the device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PlatformChange {
    pub host_index: u8,
    pub platform_index: u8,
    pub platform_source: PlatformSource,
}

impl PlatformChange {
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            host_index: record.get("host_index")? as u8,
            platform_index: record.get("platform_index")? as u8,
            platform_source: PlatformSource::from(record.get("platform_source")? as u8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, Header};
    use crate::nibble::U4;

    #[test]
    fn capability_bits() {
        let record = Record::new(&GET_FEATURE_INFOS_RESPONSE)
            .with("capability_mask", 0x0300)
            .and_then(|r| r.with("num_hosts", 3))
            .unwrap();
        let infos = FeatureInfos::from_record(&record).unwrap();

        assert!(infos.set_host_platform);
        assert!(infos.os_detection);
        assert_eq!(infos.num_hosts, 3);
    }

    #[test]
    fn platform_change_event() {
        let header = Header {
            device_index: 0x02,
            feature_index: 0x0c,
            function_id: U4::from_lo(PLATFORM_CHANGE_EVENT),
            software_id: U4::from_lo(0),
        };
        let mut payload = [0u8; 16];
        payload[..3].copy_from_slice(&[0x01, 0x04, 0x02]);

        let record = Record::from_frame(&PLATFORM_CHANGE_EVENT_REPORT, &Frame::Long(header, payload)).unwrap();
        assert_eq!(PlatformChange::from_record(&record).unwrap(), PlatformChange {
            host_index: 1,
            platform_index: 4,
            platform_source: PlatformSource::Manual,
        });
    }
}
