//! Implements the protocol-specific parts of HID++.

use std::time::Duration;

use tracing::debug;

use crate::{
    channel::Channel,
    error::{Error, Result},
    feature::{Category, root},
    frame::Header,
    nibble::U4,
};

pub mod v10;
pub mod v20;

/// Represents the protocol version a device supports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ProtocolVersion {
    /// The older HID++1.0 protocol. Mostly used for receivers.
    V10,

    /// All newer protocols starting from HID+2.0.
    ///
    /// Traditionally, the version was split into a major and a minor version,
    /// defining the concrete protocol version. These two values were later
    /// redefined to serve the purpose of indicating which host software to
    /// target.
    V20 {
        /// The protocol number is a field that hints the host software if it
        /// should support the device.
        ///
        /// `protocol_num = 2` : Intended target SW is Logitech SetPoint\
        /// `protocol_num = 3` : Intended OEM SW described in `target_sw` field\
        /// `protocol_num = 4` : Intended target SW described in `target_sw`
        /// field
        protocol_num: u8,

        /// When `protocol_num >= 3` this field further hints at which software
        /// should support the device. Otherwise the value is zero.
        target_sw: u8,
    },
}

/// The protocol an error report was received with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorProtocol {
    /// A HID++1.0 error message (sub ID `0x8f`).
    V10,

    /// A HID++2.0 error message (feature index `0xff`).
    V20,
}

/// The error kinds shared by both protocol versions.
///
/// The raw code is always kept in [`ErrorReport::code`]; this is only an
/// abstraction for callers that do not care about the protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorKind {
    /// The function is not supported in the current context.
    Unsupported,

    /// A parameter of the request is invalid.
    InvalidArgument,

    /// The device failed to execute the request.
    HardwareError,

    /// The request is not allowed, e.g. because of a locked state.
    NotAllowed,

    /// The device is busy and cannot process the request right now.
    Busy,

    /// The function index is out of range for the feature.
    InvalidFunction,

    /// Any other code.
    Other(u8),
}

/// A well-formed HID++ error report sent by a device or receiver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ErrorReport {
    /// The protocol the report was sent with.
    pub protocol: ErrorProtocol,

    /// The index of the device that reported the error.
    pub device_index: u8,

    /// The feature index of the failed request.
    pub feature_index: u8,

    /// The function ID of the failed request.
    pub function_id: U4,

    /// The software ID of the failed request.
    pub software_id: U4,

    /// The raw error code.
    pub code: u8,
}

impl ErrorReport {
    /// The correlation key of the request this report answers.
    pub fn key(&self) -> Header {
        Header {
            device_index: self.device_index,
            feature_index: self.feature_index,
            function_id: self.function_id,
            software_id: self.software_id,
        }
    }

    /// Abstracts the raw code into an [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self.protocol {
            ErrorProtocol::V20 => v20::error_kind(self.code),
            ErrorProtocol::V10 => v10::ErrorType::try_from(self.code)
                .map(v10::ErrorType::kind)
                .unwrap_or(ErrorKind::Other(self.code)),
        }
    }
}

/// Tries to determine the protocol version of the device behind a channel.
///
/// Returns `Ok(None)` if nothing answered within `timeout`.
pub async fn determine_version(
    chan: &Channel,
    timeout: Duration,
) -> Result<Option<ProtocolVersion>> {
    // A HID++2.0 device answers the root ping with its protocol version. A
    // HID++1.0 device reads feature index 0x00 as sub ID 0x00 and rejects it
    // as invalid, which pins it to 1.0.
    let ping = rand::random::<u8>();
    let request = root::ping(chan.device_index(), ping)?;

    match chan
        .send_and_wait(
            request,
            &root::GET_PROTOCOL_VERSION_RESPONSE,
            Category::Important,
            timeout,
        )
        .await
    {
        Ok(response) => {
            let version = root::ProtocolInformation::from_record(&response)?;
            if version.ping_data != ping {
                debug!(
                    expected = ping,
                    received = version.ping_data,
                    "ping data was not echoed"
                );
            }

            Ok(Some(ProtocolVersion::V20 {
                protocol_num: version.protocol_num,
                target_sw: version.target_sw,
            }))
        },
        Err(Error::Protocol(report))
            if report.protocol == ErrorProtocol::V10
                && report.code == u8::from(v10::ErrorType::InvalidSubId) =>
        {
            Ok(Some(ProtocolVersion::V10))
        },
        Err(Error::Timeout) => Ok(None),
        Err(err) => Err(err),
    }
}
