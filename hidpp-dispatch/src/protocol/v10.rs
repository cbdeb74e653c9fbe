//! Implements the HID++1.0 traffic a HID++2.0 host still has to understand:
//! receiver notifications, register responses and error messages.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::{ErrorKind, ErrorProtocol, ErrorReport};
use crate::{
    error::{Error, Result},
    frame::{LONG_REPORT_LENGTH, ReportKind, SHORT_REPORT_LENGTH},
    nibble::U4,
};

/// The index to use when communicating with the receiver itself.
pub const RECEIVER_DEVICE_INDEX: u8 = 0xff;

/// Represents the header that every HID++1.0 message starts with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MessageHeader {
    /// The index of the device involved in the communication.
    pub device_index: u8,

    /// The sub ID of the message.
    pub sub_id: u8,
}

/// Represents a HID++1.0 message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Message {
    /// Represents a short HID++1.0 message with 4 bytes of payload.
    Short(MessageHeader, [u8; SHORT_REPORT_LENGTH - 3]),

    /// Represents a long HID++1.0 message with 17 bytes of payload.
    Long(MessageHeader, [u8; LONG_REPORT_LENGTH - 3]),
}

impl Message {
    /// Reads a HID++1.0 message from a raw report.
    pub fn read_raw(data: &[u8]) -> Result<Self> {
        let kind = data
            .first()
            .copied()
            .and_then(ReportKind::from_report_id)
            .filter(|kind| kind.len() == data.len())
            .ok_or_else(|| Error::FrameShape(format!("{:02x?} is no HID++1.0 message", data)))?;

        let header = MessageHeader {
            device_index: data[1],
            sub_id: data[2],
        };

        Ok(match kind {
            ReportKind::Short => {
                let mut payload = [0; SHORT_REPORT_LENGTH - 3];
                payload.copy_from_slice(&data[3..]);
                Message::Short(header, payload)
            },
            ReportKind::Long => {
                let mut payload = [0; LONG_REPORT_LENGTH - 3];
                payload.copy_from_slice(&data[3..]);
                Message::Long(header, payload)
            },
        })
    }

    /// Extracts the header of the message.
    pub fn header(&self) -> MessageHeader {
        match *self {
            Message::Short(header, _) | Message::Long(header, _) => header,
        }
    }

    /// Extracts the payload of the message and fits it into an array capable of
    /// containing the longest possible payload, filling the rest up with
    /// zeroes.
    pub fn extend_payload(&self) -> [u8; LONG_REPORT_LENGTH - 3] {
        match *self {
            Message::Short(_, payload) => {
                let mut data = [0; LONG_REPORT_LENGTH - 3];
                data[..SHORT_REPORT_LENGTH - 3].copy_from_slice(&payload);
                data
            },
            Message::Long(_, payload) => payload,
        }
    }
}

/// Represents a globally defined sub ID of a HID++1.0 message.
///
/// This enum only includes sub IDs the dispatcher has to recognize. Receivers
/// define many more that end up on the receiver queues untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
#[repr(u8)]
pub enum MessageType {
    /// Sent by the receiver when a paired device was unpaired.
    DeviceDisconnection = 0x40,

    /// Sent by the receiver when the link to a paired device was established
    /// or lost.
    DeviceConnection = 0x41,

    /// A receiver-level event, e.g. a pairing lock change.
    LinkQualityInformation = 0x49,

    /// A receiver-level event reporting a wireless link status.
    WirelessLinkStatus = 0x4b,

    /// Used to set a 3-byte register value. A sent message of this type is
    /// usually responded with a response message of the same type (or
    /// [`Self::Error`]).
    SetRegister = 0x80,

    /// Used to retrieve a 3-byte register value.
    GetRegister = 0x81,

    /// Used to set a 16-byte register value.
    SetLongRegister = 0x82,

    /// Used to retrieve a 16-byte register value.
    GetLongRegister = 0x83,

    /// Used to indicate an error response. The error code usually included in
    /// the message can be mapped using [`ErrorType::try_from`].
    Error = 0x8f,
}

impl MessageType {
    /// Whether this sub ID is a notification the receiver sends on its own.
    pub fn is_notification(self) -> bool {
        matches!(
            self,
            Self::DeviceDisconnection
                | Self::DeviceConnection
                | Self::LinkQualityInformation
                | Self::WirelessLinkStatus
        )
    }

    /// Whether this sub ID belongs to register access.
    pub fn is_register(self) -> bool {
        matches!(
            self,
            Self::SetRegister | Self::GetRegister | Self::SetLongRegister | Self::GetLongRegister
        )
    }
}

/// Represents the type of an error a HID++1.0 device returns as part of a
/// message with the [`MessageType::Error`] type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
#[repr(u8)]
pub enum ErrorType {
    /// No error.
    Success = 0x00,

    /// The sub ID of a sent message is invalid.
    InvalidSubId = 0x01,

    /// The address included in a sent message is invalid.
    InvalidAddress = 0x02,

    /// The value included in a sent message is invalid.
    InvalidValue = 0x03,

    /// A connection request failed on the receiver's side.
    ConnectFail = 0x04,

    /// The receiver indicates that too many devices are connected to it.
    TooManyDevices = 0x05,

    /// The receiver indicates that something already exists.
    AlreadyExists = 0x06,

    /// The receiver is currently handling a downstream (to device) message and
    /// cannot process a second one.
    Busy = 0x07,

    /// Trying to send a message to a device (device index) where there is no
    /// device paired.
    UnknownDevice = 0x08,

    /// The addressed device is in disconnected mode and cannot receive
    /// commands until it reconnects.
    ResourceError = 0x09,

    /// A sent request is not available in the current context.
    RequestUnavailable = 0x0a,

    /// A request parameter has an unsupported value.
    InvalidParamValue = 0x0b,

    /// The PIN code a device was wrong.
    WrongPinCode = 0x0c,
}

impl ErrorType {
    /// Abstracts the error type into the kinds shared with HID++2.0.
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::InvalidSubId => ErrorKind::InvalidFunction,
            Self::InvalidAddress | Self::InvalidValue | Self::InvalidParamValue => {
                ErrorKind::InvalidArgument
            },
            Self::Busy => ErrorKind::Busy,
            Self::RequestUnavailable => ErrorKind::NotAllowed,
            other => ErrorKind::Other(other.into()),
        }
    }
}

/// Parses a HID++1.0 error message.
///
/// When a HID++2.0 request reaches a device or receiver that only speaks
/// HID++1.0, the feature index of the request is echoed as the sub ID and the
/// function/software byte as the register address, so the report can be
/// correlated with the request like a HID++2.0 error.
pub fn parse_error(msg: &Message) -> Option<ErrorReport> {
    let header = msg.header();
    if header.sub_id != u8::from(MessageType::Error) {
        return None;
    }

    let payload = msg.extend_payload();
    let (function_id, software_id) = U4::split(payload[1]);
    Some(ErrorReport {
        protocol: ErrorProtocol::V10,
        device_index: header.device_index,
        feature_index: payload[0],
        function_id,
        software_id,
        code: payload[2],
    })
}

/// A device connection notification (sub ID `0x41`) or a device disconnection
/// (sub ID `0x40`) sent by a receiver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConnectionNotification {
    /// The receiver slot of the device.
    pub device_index: u8,

    /// Whether the wireless link to the device is up.
    pub link_established: bool,

    /// Whether the link is encrypted.
    pub encrypted: bool,

    /// The device kind (keyboard `0x1`, mouse `0x2`, ...).
    pub device_kind: u8,

    /// The wireless product ID.
    pub wpid: u16,
}

impl ConnectionNotification {
    /// Parses a connection or disconnection notification.
    pub fn parse(msg: &Message) -> Option<Self> {
        let header = msg.header();
        let payload = msg.extend_payload();

        match MessageType::try_from(header.sub_id).ok()? {
            MessageType::DeviceConnection => Some(Self {
                device_index: header.device_index,
                link_established: payload[1] & (1 << 6) == 0,
                encrypted: payload[1] & (1 << 5) != 0,
                device_kind: payload[1] & 0x0f,
                wpid: u16::from_le_bytes([payload[2], payload[3]]),
            }),
            MessageType::DeviceDisconnection => Some(Self {
                device_index: header.device_index,
                link_established: false,
                encrypted: false,
                device_kind: 0,
                wpid: 0,
            }),
            _ => None,
        }
    }
}
