//! Implements functionality specific to HID++2.0.

use super::{ErrorKind, ErrorProtocol, ErrorReport};
use crate::{
    frame::Frame,
    nibble::{self, U4},
};

/// The feature index a device uses to signal an error.
pub const ERROR_FEATURE_INDEX: u8 = 0xff;

/// Abstracts a raw HID++2.0 error code into an [`ErrorKind`].
pub fn error_kind(code: u8) -> ErrorKind {
    match code {
        0x01 => ErrorKind::Unsupported,
        0x02 => ErrorKind::InvalidArgument,
        0x04 => ErrorKind::HardwareError,
        0x05 => ErrorKind::NotAllowed,
        0x06 => ErrorKind::Busy,
        0x07 => ErrorKind::InvalidFunction,
        other => ErrorKind::Other(other),
    }
}

/// Parses a HID++2.0 error message.
///
/// Layout: `[report id][device index][0xff][feature index][function/sw id][code]`,
/// meaning the header nibbles carry the original feature index and the
/// payload starts with the original function and software IDs.
pub fn parse_error(frame: &Frame) -> Option<ErrorReport> {
    let header = frame.header();
    if header.feature_index != ERROR_FEATURE_INDEX {
        return None;
    }

    let payload = frame.payload();
    let (function_id, software_id) = U4::split(payload[0]);
    Some(ErrorReport {
        protocol: ErrorProtocol::V20,
        device_index: header.device_index,
        feature_index: nibble::combine(header.function_id, header.software_id),
        function_id,
        software_id,
        code: payload[1],
    })
}
