//! Field descriptors for bit-exact message layouts.
//!
//! A [`BitField`] describes one field of a [`crate::record::Layout`]: where it
//! sits (implicitly, by its position in the layout), how many bits it spans,
//! how it is called and which values it accepts. Fields carry no padding; a
//! field of `length` bits occupies exactly `length` bits on the wire.

/// The widest field a layout may declare.
///
/// A long HID++ report carries 16 bytes of payload, so no single field can
/// exceed 128 bits.
pub const MAX_FIELD_BITS: u16 = 128;

/// A validator applied to a field value before it is packed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Check {
    /// The value must lie within `min..=max`.
    Range {
        /// The smallest accepted value.
        min: u128,
        /// The largest accepted value.
        max: u128,
    },

    /// The value must fit into the given amount of bytes.
    Bytes(u8),

    /// The value must be one of the listed values.
    OneOf(&'static [u128]),
}

impl Check {
    /// Tests a value against this check.
    pub fn accepts(&self, value: u128) -> bool {
        match *self {
            Check::Range { min, max } => (min..=max).contains(&value),
            Check::Bytes(count) => count >= 16 || value >> (u32::from(count) * 8) == 0,
            Check::OneOf(values) => values.contains(&value),
        }
    }
}

/// Describes a single field of a message layout.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BitField {
    /// An identifier unique within a layout.
    pub id: u8,

    /// The width of the field in bits.
    pub length: u16,

    /// The programmatic name used by [`crate::record::Record::get`] and
    /// [`crate::record::Record::set`].
    pub name: &'static str,

    /// A human readable title.
    pub title: &'static str,

    /// The value used when a record does not set the field.
    pub default: u128,

    /// Validators applied before packing.
    pub checks: &'static [Check],
}

impl BitField {
    /// Creates a field without validators and a default of zero.
    pub const fn new(id: u8, length: u16, name: &'static str) -> Self {
        Self {
            id,
            length,
            name,
            title: name,
            default: 0,
            checks: &[],
        }
    }

    /// Sets the human readable title.
    pub const fn title(mut self, title: &'static str) -> Self {
        self.title = title;
        self
    }

    /// Sets the default value.
    pub const fn default_value(mut self, default: u128) -> Self {
        self.default = default;
        self
    }

    /// Sets the validators.
    pub const fn checks(mut self, checks: &'static [Check]) -> Self {
        self.checks = checks;
        self
    }

    /// The largest value representable in the field's bit length.
    pub fn max_value(&self) -> u128 {
        if self.length >= MAX_FIELD_BITS {
            u128::MAX
        } else {
            (1u128 << self.length) - 1
        }
    }

    /// Checks a value against the bit length and every validator of the field.
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self, value: u128) -> Result<(), String> {
        if value > self.max_value() {
            return Err(format!(
                "{} = {:#x} does not fit into {} bits",
                self.name, value, self.length
            ));
        }

        match self.checks.iter().find(|check| !check.accepts(value)) {
            Some(check) => Err(format!("{} = {:#x} violates {:?}", self.name, value, check)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAG: BitField = BitField::new(0xf0, 1, "flag");
    const MODE: BitField = BitField::new(0xef, 8, "mode")
        .title("Mode")
        .default_value(2)
        .checks(&[Check::OneOf(&[1, 2, 3])]);

    #[test]
    fn value_must_fit_the_bit_length() {
        assert!(FLAG.validate(1).is_ok());
        assert!(FLAG.validate(2).is_err());
    }

    #[test]
    fn enumerated_check_rejects_unknown_values() {
        assert!(MODE.validate(3).is_ok());
        let err = MODE.validate(4).unwrap_err();
        assert!(err.contains("mode"));
    }

    #[test]
    fn range_and_byte_checks() {
        assert!(Check::Range { min: 1, max: 0xdfff }.accepts(0xdfff));
        assert!(!Check::Range { min: 1, max: 0xdfff }.accepts(0));
        assert!(Check::Bytes(2).accepts(0xffff));
        assert!(!Check::Bytes(2).accepts(0x1_0000));
        assert!(Check::Bytes(16).accepts(u128::MAX));
    }

    #[test]
    fn full_width_field_accepts_any_value() {
        let wide = BitField::new(0x01, MAX_FIELD_BITS, "padding");
        assert_eq!(wide.max_value(), u128::MAX);
        assert!(wide.validate(u128::MAX).is_ok());
    }
}
