//! A bit-exact codec and request/response dispatcher for Logitech's HID++2.0
//! protocol, built for exercising real devices from test code.
//!
//! HID++ extends standard [HID](https://en.wikipedia.org/wiki/Human_interface_device)
//! with two vendor reports: a short one (7 bytes, report ID `0x10`) and a
//! long one (20 bytes, report ID `0x11`). Every HID++2.0 message addresses a
//! device index, a feature index, a function and a software ID. Devices map
//! globally unique feature IDs to feature indices on their own, so the index
//! has to be looked up with the Root feature first.
//!
//! This crate is organized in layers:
//!
//! - [`bitfield`] and [`record`] describe messages as ordered bit fields and
//!   pack them MSB-first
//! - [`frame`] turns records into short or long reports and back
//! - [`feature`] holds the layout tables of every known feature per version,
//!   and [`feature::registry`] looks them up by feature ID
//! - [`dispatcher`] classifies inbound reports onto [`queue`]s and completes
//!   pending requests
//! - [`channel`] ties it all to a transport
//!
//! # Quickstart
//!
//! This crate does not talk to HID devices itself. The trait bridging a HID
//! implementation to it is [`channel::RawHidChannel`]. It defines async
//! methods using [`mod@async_trait`], which is re-exported for annotating the
//! implementing type.
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use hidpp_dispatch::{
//!     channel::{Channel, ChannelConfig, Route},
//!     feature::{adjustable_dpi, feature_set, registry},
//!     protocol,
//! };
//!
//! let channel = Channel::new(my_hid_channel, Route::Direct { device_index: 0x01 }, ChannelConfig::default());
//! channel.open().await.expect("could not establish HID++ communication");
//!
//! // Pings the device and tells HID++1.0 and HID++2.0 apart.
//! let version = protocol::determine_version(&channel, Duration::from_secs(1)).await?;
//!
//! // Feature indices are looked up and cached on first use.
//! for (index, info) in feature_set::enumerate(&channel).await? {
//!     println!("{index:#04x}: {}", registry::name(info.id).unwrap_or("unknown"));
//! }
//!
//! let dpi = adjustable_dpi::get_sensor_dpi(&channel, 0).await?;
//! ```

pub use async_trait::async_trait;

pub mod bitfield;
pub mod cache;
pub mod channel;
pub mod dispatcher;
pub mod error;
mod event;
pub mod feature;
pub mod frame;
pub mod nibble;
pub mod protocol;
pub mod queue;
pub mod record;

pub use error::{Error, Result};
