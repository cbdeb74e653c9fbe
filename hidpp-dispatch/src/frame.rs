//! The HID++ report envelope.
//!
//! Every HID++ message travels either as a short report (7 bytes, ID `0x10`)
//! or as a long report (20 bytes, ID `0x11`). Both start with the same header:
//!
//! ```text
//! [report_id][device_index][feature_index][function_id << 4 | software_id][payload...]
//! ```
//!
//! This module provides the raw [`Frame`] type used on the transport side and
//! the glue between frames and [`Record`]s.

use lazy_static::lazy_static;

use crate::{
    bitfield::BitField,
    error::{Error, Result},
    nibble::{self, U4},
    record::{LONG_FRAME_BITS, Layout, Record, SHORT_FRAME_BITS},
};

pub const SHORT_REPORT_ID: u8 = 0x10;
pub const SHORT_REPORT_LENGTH: usize = 7;

pub const LONG_REPORT_ID: u8 = 0x11;
pub const LONG_REPORT_LENGTH: usize = 20;

/// The amount of header bytes, including the report ID.
pub const HEADER_LENGTH: usize = 4;

/// Canonical names of the header fields shared by every HID++2.0 layout.
pub mod fields {
    pub const REPORT_ID: &str = "report_id";
    pub const DEVICE_INDEX: &str = "device_index";
    pub const FEATURE_INDEX: &str = "feature_index";
    pub const FUNCTION_INDEX: &str = "function_index";
    pub const SOFTWARE_ID: &str = "software_id";
}

lazy_static! {
    /// The header every HID++2.0 request, response and event layout starts
    /// with.
    pub static ref HIDPP_HEADER: Layout = Layout::new("HidppMessage", &[
        BitField::new(0xff, 8, fields::REPORT_ID).title("Report ID").default_value(SHORT_REPORT_ID as u128),
        BitField::new(0xfe, 8, fields::DEVICE_INDEX).title("Device Index"),
        BitField::new(0xfd, 8, fields::FEATURE_INDEX).title("Feature Index"),
        BitField::new(0xfc, 4, fields::FUNCTION_INDEX).title("Function ID"),
        BitField::new(0xfb, 4, fields::SOFTWARE_ID).title("Software ID"),
    ]);
}

/// The two HID++ report sizes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ReportKind {
    Short,
    Long,
}

impl ReportKind {
    /// Maps a report ID to its kind.
    pub fn from_report_id(id: u8) -> Option<Self> {
        match id {
            SHORT_REPORT_ID => Some(Self::Short),
            LONG_REPORT_ID => Some(Self::Long),
            _ => None,
        }
    }

    pub fn report_id(self) -> u8 {
        match self {
            Self::Short => SHORT_REPORT_ID,
            Self::Long => LONG_REPORT_ID,
        }
    }

    pub fn len(self) -> usize {
        match self {
            Self::Short => SHORT_REPORT_LENGTH,
            Self::Long => LONG_REPORT_LENGTH,
        }
    }
}

/// Represents the header that every HID++2.0 message starts with.
///
/// The header doubles as the correlation key: a response carries exactly the
/// header of the request it answers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    /// The index of the device involved in the communication.
    pub device_index: u8,

    /// The index of the feature the message belongs to.
    ///
    /// This is not the same as the feature ID, but the index the device
    /// assigned to the feature.
    pub feature_index: u8,

    /// The ID of the function (or event) involved in the communication.
    pub function_id: U4,

    /// The tag chosen by the sender. `0` marks device-initiated events.
    pub software_id: U4,
}

impl Header {
    /// Whether the message was initiated by the device.
    pub fn is_event(&self) -> bool {
        self.software_id.value() == 0
    }

    fn to_bytes(self) -> [u8; 3] {
        [
            self.device_index,
            self.feature_index,
            nibble::combine(self.function_id, self.software_id),
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let (function_id, software_id) = U4::split(bytes[2]);
        Self {
            device_index: bytes[0],
            feature_index: bytes[1],
            function_id,
            software_id,
        }
    }
}

/// A raw HID++ report as written to or read from the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Frame {
    /// A short report with 3 bytes of payload.
    Short(Header, [u8; SHORT_REPORT_LENGTH - HEADER_LENGTH]),

    /// A long report with 16 bytes of payload.
    Long(Header, [u8; LONG_REPORT_LENGTH - HEADER_LENGTH]),
}

impl Frame {
    /// Reads a HID++ report from raw data.
    ///
    /// Fails with [`Error::FrameShape`] if the report ID is not a HID++ one or
    /// the length does not match it.
    pub fn read_raw(data: &[u8]) -> Result<Self> {
        let Some(kind) = data.first().copied().and_then(ReportKind::from_report_id) else {
            return Err(Error::FrameShape(format!("{:02x?} is no HID++ report", data)));
        };

        if data.len() != kind.len() {
            return Err(Error::FrameShape(format!(
                "{:?} report with {} bytes",
                kind,
                data.len()
            )));
        }

        let header = Header::from_bytes(&data[1..HEADER_LENGTH]);
        let mut frame = match kind {
            ReportKind::Short => Frame::Short(header, [0; SHORT_REPORT_LENGTH - HEADER_LENGTH]),
            ReportKind::Long => Frame::Long(header, [0; LONG_REPORT_LENGTH - HEADER_LENGTH]),
        };
        frame.payload_mut().copy_from_slice(&data[HEADER_LENGTH..]);

        Ok(frame)
    }

    /// Writes the report in its raw byte form into a buffer.
    ///
    /// Returns the amount of written bytes.
    pub fn write_raw(&self, buf: &mut [u8]) -> usize {
        let len = self.kind().len();
        buf[0] = self.kind().report_id();
        buf[1..HEADER_LENGTH].copy_from_slice(&self.header().to_bytes());
        buf[HEADER_LENGTH..len].copy_from_slice(self.payload());
        len
    }

    /// Returns the raw bytes of the report.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = [0u8; LONG_REPORT_LENGTH];
        let len = self.write_raw(&mut buf);
        buf[..len].to_vec()
    }

    pub fn kind(&self) -> ReportKind {
        match self {
            Frame::Short(..) => ReportKind::Short,
            Frame::Long(..) => ReportKind::Long,
        }
    }

    pub fn header(&self) -> Header {
        match *self {
            Frame::Short(header, _) | Frame::Long(header, _) => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match self {
            Frame::Short(header, _) | Frame::Long(header, _) => header,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Short(_, payload) => payload,
            Frame::Long(_, payload) => payload,
        }
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        match self {
            Frame::Short(_, payload) => payload,
            Frame::Long(_, payload) => payload,
        }
    }

    /// Extracts the payload of the message and fits it into an array capable of
    /// containing the longest possible payload, filling the rest up with
    /// zeroes.
    pub fn extend_payload(&self) -> [u8; LONG_REPORT_LENGTH - HEADER_LENGTH] {
        let mut data = [0; LONG_REPORT_LENGTH - HEADER_LENGTH];
        data[..self.payload().len()].copy_from_slice(self.payload());
        data
    }

    /// Converts a short report to a long one by zero-extending its payload.
    pub fn into_long(self) -> Self {
        match self {
            Frame::Short(header, _) => Frame::Long(header, self.extend_payload()),
            long @ Frame::Long(..) => long,
        }
    }
}

impl Record {
    /// Reads the HID++2.0 header fields of the record.
    ///
    /// Fails with [`Error::InvalidArgument`] if a field holds a value its
    /// header slot cannot represent.
    pub fn header(&self) -> Result<Header> {
        Ok(Header {
            device_index: self.header_byte(fields::DEVICE_INDEX)?,
            feature_index: self.header_byte(fields::FEATURE_INDEX)?,
            function_id: self.header_nibble(fields::FUNCTION_INDEX)?,
            software_id: self.header_nibble(fields::SOFTWARE_ID)?,
        })
    }

    fn header_byte(&self, name: &str) -> Result<u8> {
        let value = self.get(name)?;
        u8::try_from(value)
            .map_err(|_| Error::InvalidArgument(format!("{} {:#x} does not fit a byte", name, value)))
    }

    fn header_nibble(&self, name: &str) -> Result<U4> {
        let byte = self.header_byte(name)?;
        U4::new(byte)
            .ok_or_else(|| Error::InvalidArgument(format!("{} {:#x} does not fit a nibble", name, byte)))
    }

    /// Writes the HID++2.0 header fields of the record.
    pub fn set_header(&mut self, header: Header) -> Result<()> {
        self.set(fields::DEVICE_INDEX, header.device_index.into())?;
        self.set(fields::FEATURE_INDEX, header.feature_index.into())?;
        self.set(fields::FUNCTION_INDEX, header.function_id.value().into())?;
        self.set(fields::SOFTWARE_ID, header.software_id.value().into())
    }

    /// Serializes the record into a report.
    ///
    /// A layout of up to 7 bytes becomes a short report unless `force_long`
    /// is set. Anything longer, up to 20 bytes, becomes a long report. The
    /// payload is zero-padded to the report length and the report ID field is
    /// stamped accordingly.
    pub fn to_frame(&self, force_long: bool) -> Result<Frame> {
        let kind = match self.layout().bit_len() {
            bits if bits <= SHORT_FRAME_BITS && !force_long => ReportKind::Short,
            bits if bits <= LONG_FRAME_BITS => ReportKind::Long,
            bits => {
                return Err(Error::FrameShape(format!(
                    "{} is {} bits long and does not fit a HID++ report",
                    self.layout().name(),
                    bits
                )));
            },
        };

        let mut record = self.clone();
        record.set(fields::REPORT_ID, kind.report_id().into())?;

        let mut bytes = record.pack()?;
        bytes.resize(kind.len(), 0);
        bytes[0] = kind.report_id();

        Frame::read_raw(&bytes)
    }

    /// Decodes a report into a record of the given layout.
    ///
    /// A report shorter than the layout is zero-extended; bytes of the report
    /// beyond the layout are only accepted if they are zero.
    pub fn from_frame(layout: &'static Layout, frame: &Frame) -> Result<Self> {
        let mut bytes = frame.to_bytes();
        let len = layout.byte_len();

        if bytes.len() > len {
            if bytes[len..].iter().any(|&byte| byte != 0) {
                return Err(Error::FrameShape(format!(
                    "{:?} report carries data beyond the layout {}",
                    frame.kind(),
                    layout.name()
                )));
            }
            bytes.truncate(len);
        }
        bytes.resize(len, 0);

        Record::unpack(layout, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    lazy_static! {
        static ref THREE_BYTES: Layout = Layout::extend(&HIDPP_HEADER, "ThreeBytes", &[
            BitField::new(0xfa, 24, "params"),
        ]);
        static ref SIXTEEN_BYTES: Layout = Layout::extend(&HIDPP_HEADER, "SixteenBytes", &[
            BitField::new(0xfa, 128, "params"),
        ]);
        static ref TWO_BYTES: Layout = Layout::extend(&HIDPP_HEADER, "TwoBytes", &[
            BitField::new(0xfa, 16, "params"),
        ]);
        static ref EIGHT_BYTES: Layout = Layout::extend(&HIDPP_HEADER, "EightBytes", &[
            BitField::new(0xfa, 64, "params"),
        ]);
        static ref UNEVEN: Layout = Layout::extend(&HIDPP_HEADER, "Uneven", &[
            BitField::new(0xfa, 121, "padding"),
        ]);
        static ref OVERSIZED: Layout = Layout::extend(&HIDPP_HEADER, "Oversized", &[
            BitField::new(0xfa, 128, "params"),
            BitField::new(0xf9, 1, "overflow"),
        ]);
    }

    fn header() -> Header {
        Header {
            device_index: 0x01,
            feature_index: 0x05,
            function_id: U4::from_lo(0x2),
            software_id: U4::from_lo(0x1),
        }
    }

    #[test]
    fn read_raw_rejects_unknown_ids_and_lengths() {
        assert!(Frame::read_raw(&[0x02, 0x01, 0x00]).is_err());
        assert!(Frame::read_raw(&[SHORT_REPORT_ID, 0x01, 0x00, 0x00]).is_err());
        assert!(Frame::read_raw(&[LONG_REPORT_ID; SHORT_REPORT_LENGTH]).is_err());
        assert!(Frame::read_raw(&[]).is_err());
    }

    #[test]
    fn raw_bytes_keep_header_layout() {
        let frame = Frame::Short(header(), [0xaa, 0xbb, 0x00]);
        let bytes = frame.to_bytes();
        assert_eq!(bytes, [0x10, 0x01, 0x05, 0x21, 0xaa, 0xbb, 0x00]);
        assert_eq!(Frame::read_raw(&bytes).unwrap(), frame);
    }

    #[test]
    fn three_byte_payload_serializes_short() {
        let mut record = Record::new(&THREE_BYTES).with("params", 0x010203).unwrap();
        record.set_header(header()).unwrap();

        let frame = record.to_frame(false).unwrap();
        assert_eq!(frame.kind(), ReportKind::Short);
        assert_eq!(frame.to_bytes(), [0x10, 0x01, 0x05, 0x21, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn sixteen_byte_payload_serializes_long() {
        let record = Record::new(&SIXTEEN_BYTES).with("params", 1).unwrap();

        let bytes = record.to_frame(false).unwrap().to_bytes();
        assert_eq!(bytes.len(), LONG_REPORT_LENGTH);
        assert_eq!(bytes[0], LONG_REPORT_ID);
        assert_eq!(bytes[19], 0x01);
    }

    #[test]
    fn forcing_long_zero_extends() {
        let record = Record::new(&THREE_BYTES).with("params", 0xffffff).unwrap();
        let bytes = record.to_frame(true).unwrap().to_bytes();

        assert_eq!(bytes.len(), LONG_REPORT_LENGTH);
        assert_eq!(bytes[0], LONG_REPORT_ID);
        assert_eq!(&bytes[4..7], &[0xff, 0xff, 0xff]);
        assert!(bytes[7..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn small_payloads_are_zero_padded_into_a_short_report() {
        let mut record = Record::new(&TWO_BYTES).with("params", 0xbeef).unwrap();
        record.set_header(header()).unwrap();

        let frame = record.to_frame(false).unwrap();
        assert_eq!(frame.to_bytes(), [0x10, 0x01, 0x05, 0x21, 0xbe, 0xef, 0x00]);
        assert_eq!(Record::from_frame(&TWO_BYTES, &frame).unwrap(), record);
    }

    #[test]
    fn mid_sized_payloads_are_zero_padded_into_a_long_report() {
        let record = Record::new(&EIGHT_BYTES).with("params", 0x0102030405060708).unwrap();

        let bytes = record.to_frame(false).unwrap().to_bytes();
        assert_eq!(bytes.len(), LONG_REPORT_LENGTH);
        assert_eq!(bytes[0], LONG_REPORT_ID);
        assert_eq!(&bytes[4..12], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert!(bytes[12..].iter().all(|&byte| byte == 0));

        let uneven = Record::new(&UNEVEN).to_frame(false).unwrap();
        assert_eq!(uneven.kind(), ReportKind::Long);
    }

    #[test]
    fn layouts_beyond_a_long_report_cannot_be_framed() {
        assert!(matches!(
            Record::new(&OVERSIZED).to_frame(false),
            Err(Error::FrameShape(_))
        ));
    }

    #[test]
    fn header_rejects_values_its_slots_cannot_hold() {
        let wide_device = Record::new(&THREE_BYTES).with(fields::DEVICE_INDEX, 0x101).unwrap();
        assert!(matches!(wide_device.header(), Err(Error::InvalidArgument(_))));

        let wide_function = Record::new(&THREE_BYTES).with(fields::FUNCTION_INDEX, 0x12).unwrap();
        assert!(matches!(wide_function.header(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn from_frame_adapts_between_sizes() {
        let short = Frame::Short(header(), [0x01, 0x02, 0x03]);
        let record = Record::from_frame(&SIXTEEN_BYTES, &short).unwrap();
        assert_eq!(record.get("params").unwrap(), 0x010203 << 104);
        assert_eq!(record.header().unwrap(), header());

        let long = short.into_long();
        let record = Record::from_frame(&THREE_BYTES, &long).unwrap();
        assert_eq!(record.get("params").unwrap(), 0x010203);

        let mut payload = long.extend_payload();
        payload[15] = 0x01;
        let dirty = Frame::Long(header(), payload);
        assert!(matches!(
            Record::from_frame(&THREE_BYTES, &dirty),
            Err(Error::FrameShape(_))
        ));
    }
}
