//! Implements the SecureDfuControl feature (ID `0x00c3`).
//!
//! The feature arms the bootloader for the next reset. Version 1 adds an event
//! reporting that the armed DFU was cancelled.

use lazy_static::lazy_static;

use super::{Category, FeatureModel, FunctionApi, VersionApi, message};
use crate::{
    bitfield::BitField,
    frame::HIDPP_HEADER,
    record::Layout,
};

pub const FEATURE_ID: u16 = 0x00c3;

pub const GET_DFU_CONTROL: u8 = 0;
pub const SET_DFU_CONTROL: u8 = 1;

pub const DFU_TIMEOUT_EVENT: u8 = 0;
pub const DFU_CANCEL_EVENT: u8 = 1;

/// `"DFU"` in ASCII, required by `SetDfuControl` to accept the request.
pub const DFU_MAGIC_KEY: u32 = 0x44_46_55;

lazy_static! {
    static ref SECURE_DFU_CONTROL: Layout =
        Layout::extend(&HIDPP_HEADER, "SecureDfuControl", &[]).for_feature(FEATURE_ID);

    pub static ref GET_DFU_CONTROL_REQUEST: Layout = message(&SECURE_DFU_CONTROL, "GetDfuControl", GET_DFU_CONTROL, &[
        BitField::new(0xfa, 24, "padding"),
    ]);

    pub static ref GET_DFU_CONTROL_RESPONSE: Layout = message(&SECURE_DFU_CONTROL, "GetDfuControlResponse", GET_DFU_CONTROL, &[
        BitField::new(0xfa, 7, "reserved_enable_dfu").title("Reserved"),
        BitField::new(0xf9, 1, "enable_dfu").title("Enable DFU"),
        BitField::new(0xf8, 8, "dfu_control_param").title("DFU Control Parameter"),
        BitField::new(0xf7, 8, "dfu_control_timeout").title("DFU Control Timeout"),
        BitField::new(0xf6, 8, "dfu_control_action_type").title("DFU Control Action Type"),
        BitField::new(0xf5, 24, "dfu_control_action_data").title("DFU Control Action Data"),
        BitField::new(0xf4, 72, "padding"),
    ]);

    pub static ref SET_DFU_CONTROL_REQUEST: Layout = message(&SECURE_DFU_CONTROL, "SetDfuControl", SET_DFU_CONTROL, &[
        BitField::new(0xfa, 7, "reserved_enable_dfu").title("Reserved"),
        BitField::new(0xf9, 1, "enable_dfu").title("Enable DFU"),
        BitField::new(0xf8, 8, "dfu_control_param").title("DFU Control Parameter"),
        BitField::new(0xf7, 16, "reserved").title("Reserved"),
        BitField::new(0xf6, 24, "dfu_magic_key")
            .title("DFU Magic Key")
            .default_value(DFU_MAGIC_KEY as u128),
        BitField::new(0xf5, 72, "padding"),
    ]);

    pub static ref SET_DFU_CONTROL_RESPONSE: Layout = message(&SECURE_DFU_CONTROL, "SetDfuControlResponse", SET_DFU_CONTROL, &[
        BitField::new(0xfa, 128, "padding"),
    ]);

    pub static ref DFU_TIMEOUT_EVENT_REPORT: Layout = message(&SECURE_DFU_CONTROL, "DfuTimeoutEvent", DFU_TIMEOUT_EVENT, &[
        BitField::new(0xfa, 8, "dfu_control_timeout").title("DFU Control Timeout"),
        BitField::new(0xf9, 120, "padding"),
    ]);

    /// The padding of this report is 121 bits where the other events pad
    /// with 120, so the layout is 153 bits long, 7 bits short of a long
    /// report. It is zero-padded when framed and decodes from a long report
    /// as long as the unused trailing bits are zero.
    pub static ref DFU_CANCEL_EVENT_REPORT: Layout = message(&SECURE_DFU_CONTROL, "DfuCancelEvent", DFU_CANCEL_EVENT, &[
        BitField::new(0xfa, 0x79, "padding"),
    ]);

    pub static ref FEATURE: FeatureModel = {
        let functions = vec![
            FunctionApi { request: &GET_DFU_CONTROL_REQUEST, response: &GET_DFU_CONTROL_RESPONSE },
            FunctionApi { request: &SET_DFU_CONTROL_REQUEST, response: &SET_DFU_CONTROL_RESPONSE },
        ];

        FeatureModel {
            id: FEATURE_ID,
            name: "SecureDfuControl",
            category: Category::Common,
            versions: vec![
                VersionApi {
                    version: 0,
                    functions: functions.clone(),
                    events: vec![&DFU_TIMEOUT_EVENT_REPORT],
                },
                VersionApi {
                    version: 1,
                    functions,
                    events: vec![&DFU_TIMEOUT_EVENT_REPORT, &DFU_CANCEL_EVENT_REPORT],
                },
            ],
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn set_dfu_control_carries_the_magic_key() {
        let record = Record::new(&SET_DFU_CONTROL_REQUEST).with("enable_dfu", 1).unwrap();
        let bytes = record.to_frame(false).unwrap().to_bytes();

        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0], 0x11);
        assert_eq!(bytes[3] >> 4, SET_DFU_CONTROL);
        assert_eq!(&bytes[4..10], &[0x01, 0x00, 0x00, 0x00, 0x44, 0x46]);
        assert_eq!(bytes[10], 0x55);
    }

    #[test]
    fn cancel_event_is_only_known_from_v1_on() {
        assert_eq!(FEATURE.factory(0).unwrap().max_event_index(), Some(0));
        assert_eq!(FEATURE.factory(1).unwrap().max_event_index(), Some(1));
        assert_eq!(DFU_CANCEL_EVENT_REPORT.bit_len(), 153);
        assert!(!DFU_CANCEL_EVENT_REPORT.is_frame_sized());
    }

    #[test]
    fn cancel_event_leaves_the_last_bits_of_a_long_report_unused() {
        let record = Record::new(&DFU_CANCEL_EVENT_REPORT);
        let frame = record.to_frame(false).unwrap();
        assert_eq!(frame.to_bytes().len(), 20);
        assert_eq!(Record::from_frame(&DFU_CANCEL_EVENT_REPORT, &frame).unwrap(), record);
    }
}
