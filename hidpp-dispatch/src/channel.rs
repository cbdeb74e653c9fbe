//! Implements messaging across a HID channel speaking HID++.
//!
//! A [`Channel`] owns a dedicated read thread feeding every inbound report to
//! its [`Dispatcher`], and a send path stamping addressing and software IDs
//! onto outbound records. Responses are mapped back to requests through the
//! dispatcher's pending awaits.

use std::{
    error::Error as StdError,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use async_trait::async_trait;
use futures::{FutureExt, channel::oneshot, select};
use hidreport::{Field, Report, ReportDescriptor, Usage, UsageId, UsagePage};
use tracing::{debug, trace, warn};

use crate::{
    cache::{FeatureCache, FeatureEntry},
    dispatcher::{Dispatched, Dispatcher},
    error::{Error, Result},
    event::StateCell,
    feature::{Category, VersionApi, registry, root},
    frame::{Header, LONG_REPORT_ID, ReportKind, SHORT_REPORT_ID},
    nibble::U4,
    queue::{Message, Queue},
    record::{Layout, Record},
};

/// hidapi defines this as the maximum EXPECTED size of report descriptors.
/// We will trust this for now, but a workaround may be required if devices do
/// in fact return longer descriptors.
const MAX_REPORT_DESCRIPTOR_LENGTH: usize = 4096;

/// The size of the buffer incoming reports are read into. Non-HID++ reports
/// may be longer than a long HID++ report.
const MAX_REPORT_LENGTH: usize = 64;

const HIDPP_USAGE_PAGE: u16 = 0xff00;
const SHORT_REPORT_USAGE: u16 = 0x0001;
const LONG_REPORT_USAGE: u16 = 0x0002;

/// The logical index a device reached through a receiver is addressed with.
pub const DIRECT_DEVICE_INDEX: u8 = 0xff;

/// The error type transports report failures with.
pub type TransportError = Box<dyn StdError + Send + Sync>;

/// Represents an arbitrary HID communication channel that is both readable and
/// writable. It has to support async I/O.
///
/// Any type this trait is implemented for can be used for HID(++)
/// communication. If a specific channel supports HID++ is determined when the
/// [`Channel`] is opened.
#[async_trait]
pub trait RawHidChannel: Send + Sync + 'static {
    fn vendor_id(&self) -> u16;

    fn product_id(&self) -> u16;

    /// Writes a raw report to the channel.
    ///
    /// Returns the exact amount of written bytes on success.
    async fn write_report(&self, src: &[u8]) -> std::result::Result<usize, TransportError>;

    /// Reads a raw report from the channel.
    ///
    /// If the buffer is not large enough to fit the whole report, its remainder
    /// should be discarded. Reading zero bytes means the transport lost the
    /// device.
    async fn read_report(&self, buf: &mut [u8]) -> std::result::Result<usize, TransportError>;

    /// If the implementation already knows whether the underlying HID channel
    /// supports HID++ messages, it should return `Some((supports_short,
    /// supports_long))` from this method.
    ///
    /// In this case, the report descriptor will not be read and parsed.
    fn supports_short_long_hidpp(&self) -> Option<(bool, bool)>;

    /// Retrieves the raw HID report descriptor from the channel.
    ///
    /// Returns the exact size of the report descriptor on success.
    async fn get_report_descriptor(
        &self,
        buf: &mut [u8],
    ) -> std::result::Result<usize, TransportError>;
}

/// Checks whether a raw channel supports short or long HID++ messages.
async fn supports_short_long_hidpp(raw: &dyn RawHidChannel) -> Result<(bool, bool)> {
    if let Some(supported) = raw.supports_short_long_hidpp() {
        return Ok(supported);
    }

    let mut raw_descriptor = vec![0u8; MAX_REPORT_DESCRIPTOR_LENGTH];
    let descriptor_size = raw
        .get_report_descriptor(&mut raw_descriptor)
        .await
        .map_err(Error::Transport)?;

    let descriptor =
        ReportDescriptor::try_from(&raw_descriptor[..descriptor_size.min(MAX_REPORT_DESCRIPTOR_LENGTH)])
            .map_err(Error::ReportDescriptor)?;

    Ok((
        has_hidpp_report(&descriptor, SHORT_REPORT_ID, SHORT_REPORT_USAGE),
        has_hidpp_report(&descriptor, LONG_REPORT_ID, LONG_REPORT_USAGE),
    ))
}

fn has_hidpp_report(descriptor: &ReportDescriptor, report_id: u8, usage: u16) -> bool {
    descriptor
        .find_input_report(&[report_id])
        .and_then(|report| report.fields().first())
        .and_then(|field| match field {
            Field::Array(arr) => Some(arr.usage_range()),
            _ => None,
        })
        .is_some_and(|range| {
            range
                .lookup_usage(&Usage::from_page_and_id(
                    UsagePage::from(HIDPP_USAGE_PAGE),
                    UsageId::from(usage),
                ))
                .is_some()
        })
}

/// How the device behind a channel is addressed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Route {
    /// Device indices are sent and received verbatim.
    Direct { device_index: u8 },

    /// The device sits in a receiver slot. It is addressed with
    /// [`DIRECT_DEVICE_INDEX`] and the index is rewritten to and from `slot`
    /// on the wire.
    ThroughReceiver { slot: u8 },
}

impl Route {
    /// The logical index of the device behind the route.
    pub fn device_index(&self) -> u8 {
        match *self {
            Route::Direct { device_index } => device_index,
            Route::ThroughReceiver { .. } => DIRECT_DEVICE_INDEX,
        }
    }

    /// Maps a device index read from the wire to the logical one.
    ///
    /// Returns [`None`] for traffic of other receiver slots.
    pub fn to_logical(&self, physical: u8) -> Option<u8> {
        match *self {
            Route::Direct { .. } => Some(physical),
            Route::ThroughReceiver { slot } => (physical == slot).then_some(DIRECT_DEVICE_INDEX),
        }
    }

    /// Maps a logical device index to the one sent on the wire.
    pub fn to_physical(&self, logical: u8) -> Result<u8> {
        match *self {
            Route::Direct { .. } => Ok(logical),
            Route::ThroughReceiver { slot } if logical == DIRECT_DEVICE_INDEX => Ok(slot),
            Route::ThroughReceiver { slot } => Err(Error::InvalidArgument(format!(
                "device index {:#04x} cannot be reached through receiver slot {}",
                logical, slot
            ))),
        }
    }
}

/// Tunes the timing and buffering of a [`Channel`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChannelConfig {
    /// How long [`Channel::invoke`] and the feature mapping wait for a
    /// response.
    pub response_timeout: Duration,

    /// How long writing a single report may take.
    pub send_timeout: Duration,

    /// The capacity of every dispatcher queue.
    pub queue_capacity: usize,

    /// How often a timed out request is sent again.
    pub retries: u8,

    /// The pause after a failed transport read.
    pub read_error_backoff: Duration,

    /// Always send long reports, even for short layouts.
    pub force_long: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_millis(600),
            queue_capacity: 64,
            retries: 0,
            read_error_backoff: Duration::from_millis(50),
            force_long: false,
        }
    }
}

impl ChannelConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_read_error_backoff(mut self, backoff: Duration) -> Self {
        self.read_error_backoff = backoff;
        self
    }

    pub fn with_force_long(mut self, force_long: bool) -> Self {
        self.force_long = force_long;
        self
    }
}

/// The connection state of a [`Channel`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ChannelState {
    Closed,
    Open,

    /// The channel is open, but the transport or the receiver reported the
    /// device as gone.
    Disconnected,
}

struct Inner {
    raw: Arc<dyn RawHidChannel>,
    route: Route,
    config: ChannelConfig,
    dispatcher: Arc<Dispatcher>,
    state: StateCell<ChannelState>,
    supports: Mutex<(bool, bool)>,
}

impl Inner {
    fn state(&self) -> ChannelState {
        self.state.get()
    }

    fn set_state(&self, new: ChannelState) {
        if let Some(old) = self.state.set(new) {
            debug!(from = ?old, to = ?new, "channel state changed");
        }
    }

    fn handle_report(&self, data: &[u8]) {
        let dispatched = self.dispatcher.dispatch(data);

        match dispatched {
            Dispatched::Link {
                device_index,
                established,
            } if device_index == self.route.device_index() => {
                match (established, self.state()) {
                    (true, ChannelState::Disconnected) => self.set_state(ChannelState::Open),
                    (false, ChannelState::Open) => self.set_state(ChannelState::Disconnected),
                    _ => {},
                }
            },
            dispatched
                if dispatched.is_device_traffic()
                    && self.state() == ChannelState::Disconnected =>
            {
                self.set_state(ChannelState::Open);
            },
            _ => {},
        }
    }

    fn transport_lost(&self) {
        if self.state() != ChannelState::Open {
            return;
        }

        warn!(
            vendor_id = self.raw.vendor_id(),
            product_id = self.raw.product_id(),
            "transport lost the device"
        );
        self.set_state(ChannelState::Disconnected);
        self.dispatcher.cache().clear();
        self.dispatcher.fail_all(|| Error::ChannelClosed);
    }
}

struct ReadThread {
    close: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ReadThread {
    fn stop(self) {
        // Fails only if the read thread already stopped.
        let _ = self.close.send(());

        if self.handle.join().is_err() {
            warn!("the read thread panicked");
        }
    }
}

/// Represents a HID communication channel supporting HID++.
pub struct Channel {
    inner: Arc<Inner>,
    reader: Mutex<Option<ReadThread>>,
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().unwrap().take() {
            reader.stop();
        }
    }
}

impl Channel {
    /// Creates a closed channel on top of a raw HID channel.
    pub fn new<T: RawHidChannel>(raw: T, route: Route, config: ChannelConfig) -> Self {
        Self::from_arc(Arc::new(raw), route, config)
    }

    /// Like [`Self::new`], for a raw channel that is shared already.
    pub fn from_arc(raw: Arc<dyn RawHidChannel>, route: Route, config: ChannelConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                raw,
                route,
                config,
                dispatcher: Arc::new(Dispatcher::new(route, config.queue_capacity)),
                state: StateCell::new(ChannelState::Closed),
                supports: Mutex::new((false, false)),
            }),
            reader: Mutex::new(None),
        }
    }

    /// Opens the channel and starts reading from it.
    ///
    /// Fails with [`Error::HidppNotSupported`] if the HID channel supports
    /// neither short nor long HID++ reports. Opening an open channel does
    /// nothing.
    pub async fn open(&self) -> Result<()> {
        if self.reader.lock().unwrap().is_some() {
            return Ok(());
        }

        let (supports_short, supports_long) = supports_short_long_hidpp(&*self.inner.raw).await?;
        if !supports_short && !supports_long {
            return Err(Error::HidppNotSupported);
        }

        let mut reader = self.reader.lock().unwrap();
        if reader.is_some() {
            return Ok(());
        }
        *self.inner.supports.lock().unwrap() = (supports_short, supports_long);

        let (close_sender, mut close_receiver) = oneshot::channel::<()>();
        let handle = thread::spawn({
            let inner = Arc::clone(&self.inner);

            move || {
                futures::executor::block_on(async {
                    let mut buf = [0u8; MAX_REPORT_LENGTH];

                    loop {
                        let res = select! {
                            _ = close_receiver => {
                                break;
                            },
                            res = inner.raw.read_report(&mut buf).fuse() => res
                        };

                        match res {
                            Ok(0) => {
                                inner.transport_lost();
                                thread::sleep(inner.config.read_error_backoff);
                            },
                            Ok(len) => inner.handle_report(&buf[..len.min(MAX_REPORT_LENGTH)]),
                            Err(err) => {
                                warn!(%err, "reading from the transport failed");
                                inner.transport_lost();
                                thread::sleep(inner.config.read_error_backoff);
                            },
                        }
                    }
                });
            }
        });

        *reader = Some(ReadThread {
            close: close_sender,
            handle,
        });
        drop(reader);

        debug!(
            route = ?self.inner.route,
            supports_short,
            supports_long,
            "channel opened"
        );
        self.inner.set_state(ChannelState::Open);
        Ok(())
    }

    /// Stops reading, fails every pending await with
    /// [`Error::ChannelClosed`] and forgets all cached and queued state.
    /// Closing a closed channel does nothing.
    pub async fn close(&self) {
        let reader = self.reader.lock().unwrap().take();
        let Some(reader) = reader else {
            return;
        };
        reader.stop();

        self.inner.dispatcher.fail_all(|| Error::ChannelClosed);
        self.inner.dispatcher.cache().clear();
        self.inner.dispatcher.clear_all_queues();
        self.inner.set_state(ChannelState::Closed);
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state()
    }

    /// Creates a receiver for all future state changes of the channel.
    pub fn listen(&self) -> flume::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// The logical index of the device behind the channel.
    pub fn device_index(&self) -> u8 {
        self.inner.route.device_index()
    }

    pub fn route(&self) -> Route {
        self.inner.route
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    pub fn vendor_id(&self) -> u16 {
        self.inner.raw.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.inner.raw.product_id()
    }

    /// Whether the channel supports short (7 bytes) HID++ reports.
    pub fn supports_short(&self) -> bool {
        self.inner.supports.lock().unwrap().0
    }

    /// Whether the channel supports long (20 bytes) HID++ reports.
    pub fn supports_long(&self) -> bool {
        self.inner.supports.lock().unwrap().1
    }

    pub fn cache(&self) -> &FeatureCache {
        self.inner.dispatcher.cache()
    }

    /// Sends a request and waits for the response.
    ///
    /// The response is decoded with `response`. A software ID of 0 in the
    /// request header is replaced by a free one; a nonzero one is kept. Error
    /// reports answering the request fail with [`Error::Protocol`].
    pub async fn send_and_wait(
        &self,
        mut request: Record,
        response: &'static Layout,
        queue: impl Into<Queue>,
        timeout: Duration,
    ) -> Result<Record> {
        let queue = queue.into();
        let requested = request.header()?;

        for attempt in 0..=self.inner.config.retries {
            let (header, pending) = self
                .inner
                .dispatcher
                .register_await(requested, queue, response)?;
            request.set_header(header)?;
            self.send_frame(&request).await?;

            match tokio::time::timeout(timeout, pending.recv()).await {
                Ok(result) => return result,
                Err(_) => debug!(attempt, header = ?header, "request timed out"),
            }
        }

        Err(Error::Timeout)
    }

    /// Sends a request without waiting for anything.
    pub async fn send_only(&self, request: Record) -> Result<()> {
        self.send_frame(&request).await
    }

    async fn send_frame(&self, record: &Record) -> Result<()> {
        if self.state() != ChannelState::Open {
            return Err(Error::ChannelClosed);
        }

        let (supports_short, supports_long) = *self.inner.supports.lock().unwrap();
        let mut frame = record.to_frame(self.inner.config.force_long || !supports_short)?;
        if frame.kind() == ReportKind::Long && !supports_long {
            return Err(Error::InvalidArgument(format!(
                "{} needs a long report, which the channel does not support",
                record.layout().name()
            )));
        }

        let header = frame.header_mut();
        header.device_index = self.inner.route.to_physical(header.device_index)?;

        let bytes = frame.to_bytes();
        trace!(data = ?bytes, "TX");

        match tokio::time::timeout(self.inner.config.send_timeout, self.inner.raw.write_report(&bytes)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(Error::Transport(err)),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Waits for the next event decoded with `layout`.
    pub async fn await_event(&self, layout: &'static Layout, timeout: Duration) -> Result<Record> {
        let filter = move |msg: &Message| {
            msg.as_record()
                .is_some_and(|record| std::ptr::eq(record.layout(), layout))
        };

        match self.wait_for(Queue::Event, filter, timeout).await? {
            Message::Hidpp(record) => Ok(record),
            other => Err(Error::FrameShape(format!("unexpected event {:?}", other))),
        }
    }

    /// Waits for the next message on a queue.
    pub async fn get_message(&self, queue: Queue, timeout: Duration) -> Result<Message> {
        self.wait_for(queue, |_| true, timeout).await
    }

    /// Waits for the next message on a queue accepted by `filter`.
    pub async fn wait_for<F>(&self, queue: Queue, filter: F, timeout: Duration) -> Result<Message>
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        self.inner
            .dispatcher
            .get_message(queue, filter, timeout)
            .await
    }

    /// Removes and returns everything stored on a queue.
    pub fn drain(&self, queue: Queue) -> Vec<Message> {
        self.inner.dispatcher.drain(queue)
    }

    pub fn clear_all_queues(&self) {
        self.inner.dispatcher.clear_all_queues();
    }

    pub fn reset_feature_cache(&self) {
        self.inner.dispatcher.cache().clear();
    }

    /// Returns the feature index of `feature_id`, asking the device if it is
    /// not cached yet.
    ///
    /// Fails with [`Error::UnsupportedFeature`] if the device reported the
    /// feature as absent, now or earlier.
    pub async fn update_feature_mapping(&self, feature_id: u16) -> Result<u8> {
        let device_index = self.device_index();
        match self.cache().get(device_index, feature_id) {
            Some(FeatureEntry::Supported { index, .. }) => return Ok(index),
            Some(FeatureEntry::Unsupported) => {
                return Err(Error::UnsupportedFeature { feature_id });
            },
            None => {},
        }

        let root_version = self.root_version().await?;
        if feature_id == root::FEATURE_ID {
            return Ok(root::FEATURE_INDEX);
        }

        let response = root::FEATURE.factory(root_version)?.response(root::GET_FEATURE)?;
        let response = self
            .send_and_wait(
                root::get_feature(device_index, feature_id)?,
                response,
                Category::Important,
                self.inner.config.response_timeout,
            )
            .await?;
        let info = root::FeatureInformation::from_record(&response)?;

        if info.index == 0 {
            debug!(device_index, feature_id, "feature is not supported");
            self.cache().insert_unsupported(device_index, feature_id);
            return Err(Error::UnsupportedFeature { feature_id });
        }

        let version = if root_version >= 1 { info.version } else { 0 };
        debug!(device_index, feature_id, index = info.index, version, "feature mapped");
        self.cache()
            .insert_supported(device_index, feature_id, info.index, version);

        Ok(info.index)
    }

    /// Maps Root onto itself, learning the Root version on the way.
    async fn root_version(&self) -> Result<u8> {
        let device_index = self.device_index();
        if let Some(FeatureEntry::Supported { version, .. }) =
            self.cache().get(device_index, root::FEATURE_ID)
        {
            return Ok(version);
        }

        // Version 0 devices answer with a zero version byte.
        let response = self
            .send_and_wait(
                root::get_feature(device_index, root::FEATURE_ID)?,
                &root::GET_FEATURE_RESPONSE_V1,
                Category::Important,
                self.inner.config.response_timeout,
            )
            .await?;
        let version = root::FeatureInformation::from_record(&response)?.version;

        debug!(device_index, version, "root feature version");
        self.cache()
            .insert_supported(device_index, root::FEATURE_ID, root::FEATURE_INDEX, version);

        Ok(version)
    }

    /// The version the device implements a feature in.
    pub async fn feature_version(&self, feature_id: u16) -> Result<u8> {
        self.update_feature_mapping(feature_id).await?;

        match self.cache().get(self.device_index(), feature_id) {
            Some(FeatureEntry::Supported { version, .. }) => Ok(version),
            // The entry vanished, e.g. because the device disconnected.
            _ => Err(Error::ChannelClosed),
        }
    }

    /// The function and event tables matching the version the device
    /// implements a feature in.
    pub async fn factory(&self, feature_id: u16) -> Result<&'static VersionApi> {
        let version = self.feature_version(feature_id).await?;
        registry::factory(feature_id, version)
    }

    /// Builds a request for a function of a feature, addressed to the mapped
    /// feature index.
    pub async fn request(&self, feature_id: u16, function_index: u8) -> Result<Record> {
        let feature_index = self.update_feature_mapping(feature_id).await?;
        let layout = self.factory(feature_id).await?.request(function_index)?;

        let mut request = Record::new(layout);
        request.set_header(Header {
            device_index: self.device_index(),
            feature_index,
            function_id: U4::from_lo(function_index),
            software_id: U4::from_lo(0),
        })?;

        Ok(request)
    }

    /// Sends a request built by [`Self::request`] and waits for its response
    /// on the queue of the feature's category.
    pub async fn invoke(&self, request: Record) -> Result<Record> {
        let feature_id = request.layout().feature_id().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} does not belong to a feature",
                request.layout().name()
            ))
        })?;
        let category = registry::lookup(feature_id)
            .ok_or(Error::UnsupportedFeature { feature_id })?
            .category;
        let function_index = request.header()?.function_id.value();
        let response = self.factory(feature_id).await?.response(function_index)?;

        self.send_and_wait(request, response, category, self.inner.config.response_timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_route_rewrites_indices() {
        let route = Route::ThroughReceiver { slot: 0x03 };

        assert_eq!(route.device_index(), DIRECT_DEVICE_INDEX);
        assert_eq!(route.to_logical(0x03), Some(DIRECT_DEVICE_INDEX));
        assert_eq!(route.to_logical(0x02), None);
        assert_eq!(route.to_physical(DIRECT_DEVICE_INDEX).unwrap(), 0x03);
        assert!(matches!(route.to_physical(0x01), Err(Error::InvalidArgument(_))));

        let route = Route::Direct { device_index: 0x01 };
        assert_eq!(route.to_logical(0x02), Some(0x02));
        assert_eq!(route.to_physical(0x01).unwrap(), 0x01);
    }

    #[test]
    fn config_builder() {
        let config = ChannelConfig::default()
            .with_retries(2)
            .with_force_long(true)
            .with_queue_capacity(8);

        assert_eq!(config.retries, 2);
        assert!(config.force_long);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.response_timeout, Duration::from_secs(2));
        assert_eq!(config.send_timeout, Duration::from_millis(600));
    }

    /// The vendor collections of a receiver exposing both HID++ reports.
    const HIDPP_DESCRIPTOR: &[u8] = &[
        0x06, 0x00, 0xff, 0x09, 0x01, 0xa1, 0x01, 0x85, 0x10, 0x75, 0x08, 0x95, 0x06, 0x15, 0x00,
        0x26, 0xff, 0x00, 0x09, 0x01, 0x81, 0x00, 0x09, 0x01, 0x91, 0x00, 0xc0, 0x06, 0x00, 0xff,
        0x09, 0x02, 0xa1, 0x01, 0x85, 0x11, 0x75, 0x08, 0x95, 0x13, 0x15, 0x00, 0x26, 0xff, 0x00,
        0x09, 0x02, 0x81, 0x00, 0x09, 0x02, 0x91, 0x00, 0xc0,
    ];

    #[test]
    fn descriptor_detection() {
        let descriptor = ReportDescriptor::try_from(HIDPP_DESCRIPTOR).unwrap();

        assert!(has_hidpp_report(&descriptor, SHORT_REPORT_ID, SHORT_REPORT_USAGE));
        assert!(has_hidpp_report(&descriptor, LONG_REPORT_ID, LONG_REPORT_USAGE));
        assert!(!has_hidpp_report(&descriptor, 0x12, LONG_REPORT_USAGE));
    }
}
