//! Error types shared by the codec, the dispatcher and the channel.

use thiserror::Error;

use crate::{protocol::ErrorReport, queue::Queue};

/// Represents every error the crate can surface to a caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bytes that do not fit the expected frame or record layout.
    ///
    /// Inbound frames with this problem never reach a caller; the dispatcher
    /// logs and drops them.
    #[error("malformed frame: {0}")]
    FrameShape(String),

    /// A field value or request parameter was rejected before anything was
    /// sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The device answered with a well-formed HID++ error frame.
    #[error("the device returned {:?} (code {:#04x}) for feature index {:#04x}", .0.kind(), .0.code, .0.feature_index)]
    Protocol(ErrorReport),

    /// The feature is not supported by the device, or the device advertises a
    /// version of it that is unknown to the catalog.
    #[error("feature {feature_id:#06x} is not supported")]
    UnsupportedFeature {
        /// The ID of the feature in question.
        feature_id: u16,
    },

    /// No matching response arrived in time.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The channel was closed or the device was disconnected while the
    /// operation was pending.
    #[error("the channel is closed or the device disconnected")]
    ChannelClosed,

    /// A response or error queue ran full.
    #[error("the {0:?} queue overflowed")]
    QueueOverflow(Queue),

    /// All 15 software IDs are taken by outstanding requests on the same
    /// device, feature and function.
    #[error("no free software ID for this function")]
    NoFreeSoftwareId,

    /// The HID channel exposes neither short nor long HID++ reports.
    #[error("the HID channel does not support HID++")]
    HidppNotSupported,

    /// The HID report descriptor could not be parsed.
    #[error("the report descriptor could not be parsed")]
    ReportDescriptor(hidreport::ParserError),

    /// The transport implementation returned an error.
    #[error("the HID transport returned an error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
