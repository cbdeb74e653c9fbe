//! Message layouts and the records built from them.
//!
//! A [`Layout`] is an ordered list of [`BitField`]s. Layouts are declared once
//! (usually inside `lazy_static!`) and inherit from each other by appending:
//! [`Layout::extend`] produces the parent's fields followed by the additions,
//! so the packing order always follows the resulting list.
//!
//! A [`Record`] pairs a `'static` layout with one value per field. Records are
//! plain values; packing writes every field MSB-first, unpacking reads them
//! back in the same order.

use std::{collections::HashSet, fmt};

use crate::{
    bitfield::{BitField, MAX_FIELD_BITS},
    error::{Error, Result},
};

/// The bit length of a short HID++ report, including the report ID.
pub const SHORT_FRAME_BITS: usize = 7 * 8;

/// The bit length of a long HID++ report, including the report ID.
pub const LONG_FRAME_BITS: usize = 20 * 8;

/// An ordered composition of [`BitField`]s with an exact bit layout.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Layout {
    name: &'static str,
    fields: Vec<BitField>,
    feature_id: Option<u16>,
}

impl Layout {
    /// Creates a layout without a parent.
    pub fn new(name: &'static str, fields: &[BitField]) -> Self {
        Self {
            name,
            fields: fields.to_vec(),
            feature_id: None,
        }
    }

    /// Creates a layout consisting of the fields of `parent` followed by
    /// `additions`.
    ///
    /// The owning feature ID is inherited from the parent.
    pub fn extend(parent: &Layout, name: &'static str, additions: &[BitField]) -> Self {
        let mut fields = parent.fields.clone();
        fields.extend_from_slice(additions);

        Self {
            name,
            fields,
            feature_id: parent.feature_id,
        }
    }

    /// Marks the layout as belonging to a specific feature.
    pub fn for_feature(mut self, feature_id: u16) -> Self {
        self.feature_id = Some(feature_id);
        self
    }

    /// Overrides the default value of an inherited field.
    ///
    /// Offsets and lengths are fixed by the parent and cannot be changed.
    pub fn with_default(mut self, name: &str, default: u128) -> Self {
        let field = self.fields.iter_mut().find(|field| field.name == name);
        debug_assert!(field.is_some(), "{} has no field named {}", self.name, name);

        if let Some(field) = field {
            field.default = default;
        }
        self
    }

    /// The name of the layout.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The feature this layout belongs to, if any.
    pub fn feature_id(&self) -> Option<u16> {
        self.feature_id
    }

    /// All fields in packing order.
    pub fn fields(&self) -> &[BitField] {
        &self.fields
    }

    /// Looks up a field and its position by name.
    pub fn field(&self, name: &str) -> Option<(usize, &BitField)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// The bit offset of a field from the start of the record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let (position, _) = self.field(name)?;
        Some(
            self.fields[..position]
                .iter()
                .map(|field| usize::from(field.length))
                .sum(),
        )
    }

    /// The sum of all field lengths.
    pub fn bit_len(&self) -> usize {
        self.fields
            .iter()
            .map(|field| usize::from(field.length))
            .sum()
    }

    /// The amount of bytes a packed record occupies.
    pub fn byte_len(&self) -> usize {
        self.bit_len().div_ceil(8)
    }

    /// Whether the record ends on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_len() % 8 == 0
    }

    /// Whether the record has exactly the size of a short or long HID++
    /// report.
    pub fn is_frame_sized(&self) -> bool {
        matches!(self.bit_len(), SHORT_FRAME_BITS | LONG_FRAME_BITS)
    }

    /// Checks the structural invariants of the layout: unique field IDs and
    /// names, field lengths within `1..=128` and defaults that pass their own
    /// validators.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();

        for field in &self.fields {
            if !ids.insert(field.id) {
                return Err(Error::InvalidArgument(format!(
                    "{}: duplicate field id {:#04x}",
                    self.name, field.id
                )));
            }
            if !names.insert(field.name) {
                return Err(Error::InvalidArgument(format!(
                    "{}: duplicate field name {}",
                    self.name, field.name
                )));
            }
            if field.length == 0 || field.length > MAX_FIELD_BITS {
                return Err(Error::InvalidArgument(format!(
                    "{}: field {} has an invalid length of {} bits",
                    self.name, field.name, field.length
                )));
            }
            field
                .validate(field.default)
                .map_err(|reason| Error::InvalidArgument(format!("{}: {}", self.name, reason)))?;
        }

        Ok(())
    }
}

/// A set of values laid out according to a [`Layout`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Record {
    layout: &'static Layout,
    values: Vec<u128>,
}

impl Record {
    /// Creates a record with every field set to its default value.
    pub fn new(layout: &'static Layout) -> Self {
        Self {
            layout,
            values: layout.fields.iter().map(|field| field.default).collect(),
        }
    }

    /// The layout of the record.
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Iterates over all fields together with their current values.
    pub fn values(&self) -> impl Iterator<Item = (&'static BitField, u128)> + '_ {
        self.layout.fields.iter().zip(self.values.iter().copied())
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.layout.field(name).map(|(pos, _)| pos).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no field named {}", self.layout.name, name))
        })
    }

    /// Reads a field value.
    pub fn get(&self, name: &str) -> Result<u128> {
        Ok(self.values[self.position(name)?])
    }

    /// Writes a field value.
    ///
    /// The value is validated when the record is packed.
    pub fn set(&mut self, name: &str, value: u128) -> Result<()> {
        let pos = self.position(name)?;
        self.values[pos] = value;
        Ok(())
    }

    /// Builder-style variant of [`Self::set`].
    pub fn with(mut self, name: &str, value: u128) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Reads a byte-aligned field as big-endian bytes.
    pub fn get_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let pos = self.position(name)?;
        let field = &self.layout.fields[pos];
        if field.length % 8 != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} is {} bits long and cannot be read as bytes",
                field.name, field.length
            )));
        }

        let len = usize::from(field.length / 8);
        Ok(self.values[pos].to_be_bytes()[16 - len..].to_vec())
    }

    /// Writes a byte-aligned field from big-endian bytes.
    pub fn set_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let pos = self.position(name)?;
        let field = &self.layout.fields[pos];
        if bytes.len() * 8 != usize::from(field.length) {
            return Err(Error::InvalidArgument(format!(
                "{} takes {} bits, got {} bytes",
                field.name,
                field.length,
                bytes.len()
            )));
        }

        self.values[pos] = bytes
            .iter()
            .fold(0u128, |acc, &byte| (acc << 8) | u128::from(byte));
        Ok(())
    }

    /// Serializes the record.
    ///
    /// Every value is validated first, so an out-of-range value fails with
    /// [`Error::InvalidArgument`] before any byte is produced.
    pub fn pack(&self) -> Result<Vec<u8>> {
        for (field, value) in self.values() {
            field
                .validate(value)
                .map_err(|reason| Error::InvalidArgument(format!("{}: {}", self.layout.name, reason)))?;
        }

        let mut buf = vec![0u8; self.layout.byte_len()];
        let mut offset = 0;
        for (field, value) in self.values() {
            write_bits(&mut buf, offset, field.length, value);
            offset += usize::from(field.length);
        }

        Ok(buf)
    }

    /// Deserializes a record.
    ///
    /// The input must have exactly the byte length of the layout. Missing
    /// bytes, surplus bytes and set bits after the last field all fail with
    /// [`Error::FrameShape`].
    pub fn unpack(layout: &'static Layout, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != layout.byte_len() {
            return Err(Error::FrameShape(format!(
                "{} needs {} bytes, got {}",
                layout.name,
                layout.byte_len(),
                bytes.len()
            )));
        }

        let mut offset = 0;
        let mut values = Vec::with_capacity(layout.fields.len());
        for field in &layout.fields {
            values.push(read_bits(bytes, offset, field.length));
            offset += usize::from(field.length);
        }

        let slack = bytes.len() * 8 - offset;
        if slack > 0 && read_bits(bytes, offset, slack as u16) != 0 {
            return Err(Error::FrameShape(format!(
                "{} has bits set after its last field",
                layout.name
            )));
        }

        Ok(Self { layout, values })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.layout.name)?;
        for (i, (field, value)) in self.values().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:#x}", field.name, value)?;
        }
        write!(f, ")")
    }
}

fn write_bits(buf: &mut [u8], offset: usize, length: u16, value: u128) {
    let length = usize::from(length);
    for i in 0..length {
        if (value >> (length - 1 - i)) & 1 == 1 {
            let pos = offset + i;
            buf[pos / 8] |= 0x80 >> (pos % 8);
        }
    }
}

fn read_bits(buf: &[u8], offset: usize, length: u16) -> u128 {
    (0..usize::from(length)).fold(0u128, |acc, i| {
        let pos = offset + i;
        (acc << 1) | u128::from((buf[pos / 8] >> (7 - pos % 8)) & 1)
    })
}
