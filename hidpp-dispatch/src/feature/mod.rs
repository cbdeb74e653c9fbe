//! The HID++2.0 feature model.
//!
//! A feature is described once by a [`FeatureModel`]: its ID, the queue its
//! responses are delivered on and, per version, a table of request/response
//! layouts per function index and report layouts per event index. Callers
//! never pick a layout by name; they ask [`FeatureModel::factory`] (or
//! [`registry::factory`]) for the version a device advertises.

use crate::{
    bitfield::BitField,
    error::{Error, Result},
    frame::{LONG_REPORT_ID, fields},
    record::{Layout, SHORT_FRAME_BITS},
};

pub mod adjustable_dpi;
pub mod extended_report_rate;
pub mod feature_set;
pub mod multi_platform;
pub mod registry;
pub mod root;
pub mod secure_dfu_control;

/// The queue category responses of a feature are delivered on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Category {
    /// Root and feature enumeration.
    Important,
    Common,
    Mouse,
    Keyboard,
    Touchpad,
    Gaming,
    Peripheral,
}

/// The layouts of a single function.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FunctionApi {
    pub request: &'static Layout,
    pub response: &'static Layout,
}

/// The function and event tables of one feature version.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VersionApi {
    /// The feature version the tables belong to.
    pub version: u8,

    /// Functions, indexed densely from 0.
    pub functions: Vec<FunctionApi>,

    /// Event reports, indexed densely from 0.
    pub events: Vec<&'static Layout>,
}

impl VersionApi {
    fn function(&self, index: u8) -> Result<&FunctionApi> {
        self.functions.get(usize::from(index)).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "function index {} exceeds the maximum of {} in version {}",
                index,
                self.max_function_index(),
                self.version
            ))
        })
    }

    /// The request layout of a function.
    pub fn request(&self, index: u8) -> Result<&'static Layout> {
        self.function(index).map(|function| function.request)
    }

    /// The response layout of a function.
    pub fn response(&self, index: u8) -> Result<&'static Layout> {
        self.function(index).map(|function| function.response)
    }

    /// The report layout of an event.
    pub fn event(&self, index: u8) -> Result<&'static Layout> {
        self.events.get(usize::from(index)).copied().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "event index {} is not defined in version {}",
                index, self.version
            ))
        })
    }

    pub fn max_function_index(&self) -> u8 {
        self.functions.len().saturating_sub(1) as u8
    }

    /// The highest event index, or [`None`] if the version has no events.
    pub fn max_event_index(&self) -> Option<u8> {
        self.events.len().checked_sub(1).map(|max| max as u8)
    }
}

/// Describes a HID++2.0 feature across all of its known versions.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FeatureModel {
    /// The protocol ID of the feature.
    pub id: u16,

    /// The name of the feature.
    pub name: &'static str,

    /// The queue category responses of this feature are delivered on.
    pub category: Category,

    /// The known versions of the feature.
    pub versions: Vec<VersionApi>,
}

impl FeatureModel {
    /// Returns the tables of a specific version.
    ///
    /// A version unknown to the catalog makes the feature unsupported.
    pub fn factory(&self, version: u8) -> Result<&VersionApi> {
        self.versions
            .iter()
            .find(|api| api.version == version)
            .ok_or(Error::UnsupportedFeature {
                feature_id: self.id,
            })
    }
}

/// Derives the layout of a single message from a feature base layout.
///
/// The function index default is set to `function_index` and layouts that do
/// not fit a short report default to the long report ID.
pub(crate) fn message(
    base: &Layout,
    name: &'static str,
    function_index: u8,
    additions: &[BitField],
) -> Layout {
    let layout = Layout::extend(base, name, additions)
        .with_default(fields::FUNCTION_INDEX, function_index.into());

    if layout.bit_len() > SHORT_FRAME_BITS {
        layout.with_default(fields::REPORT_ID, LONG_REPORT_ID.into())
    } else {
        layout
    }
}

/// A bitfield describing some properties of a feature.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureType {
    /// An obsolete feature is a feature that has been replaced by a newer one,
    /// but is advertised in order for older SWs to still be able to support the
    /// feature (in case the old SW does not know yet the newer one).
    pub obsolete: bool,

    /// A SW hidden feature is a feature that should not be known/managed/used
    /// by end user configuration SW. The host should ignore this type of
    /// features.
    pub hidden: bool,

    /// A hidden feature that has been disabled for user software. Used for
    /// internal testing and manufacturing.
    pub engineering: bool,

    /// A manufacturing feature that can be permanently deactivated. It is
    /// usually also hidden and engineering.
    pub manufacturing_deactivatable: bool,

    /// A compliance feature that can be permanently deactivated. It is usually
    /// also hidden and engineering.
    pub compliance_deactivatable: bool,
}

impl From<u8> for FeatureType {
    fn from(value: u8) -> Self {
        Self {
            obsolete: value & (1 << 7) != 0,
            hidden: value & (1 << 6) != 0,
            engineering: value & (1 << 5) != 0,
            manufacturing_deactivatable: value & (1 << 4) != 0,
            compliance_deactivatable: value & (1 << 3) != 0,
        }
    }
}
