//! Classifies inbound reports and hands them to whoever is waiting for them.
//!
//! Every report read from the transport passes through [`Dispatcher::dispatch`]
//! exactly once. It either completes a pending await registered by
//! [`Dispatcher::register_await`] or ends up on one of the [`Queue`]s:
//!
//! - reports that are not HID++ go to [`Queue::Hid`]
//! - HID++1.0 receiver traffic goes to the connection and receiver queues
//! - HID++2.0 errors nobody waited for go to [`Queue::Error`]
//! - HID++2.0 traffic of unmapped feature indices goes to [`Queue::Generic`]
//! - events (software ID 0) go to [`Queue::Event`]
//! - everything else goes to the category queue of its feature
//!
//! Malformed reports are logged and dropped.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::channel::oneshot;
use tracing::{debug, trace, warn};

use crate::{
    cache::FeatureCache,
    channel::Route,
    error::{Error, Result},
    feature::{Category, VersionApi, registry},
    frame::{Frame, Header, ReportKind},
    nibble::U4,
    protocol::{
        ErrorReport,
        v10::{self, ConnectionNotification, MessageType, RECEIVER_DEVICE_INDEX},
        v20,
    },
    queue::{Message, MessageQueue, Queue},
    record::{Layout, Record},
};

/// What became of a dispatched report.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dispatched {
    /// The report completed a pending await.
    Answered,

    /// The report was stored on a queue.
    Queued(Queue),

    /// The report was malformed or could not be decoded.
    Dropped,

    /// A receiver reported that the link to a device came up or went down.
    /// The notification itself was stored on [`Queue::Connection`].
    Link {
        /// The logical index of the device.
        device_index: u8,
        established: bool,
    },
}

impl Dispatched {
    /// Whether the report proves that a HID++2.0 device is reachable.
    pub fn is_device_traffic(self) -> bool {
        matches!(
            self,
            Self::Answered
                | Self::Queued(
                    Queue::Important
                        | Queue::Common
                        | Queue::Mouse
                        | Queue::Keyboard
                        | Queue::Touchpad
                        | Queue::Gaming
                        | Queue::Peripheral
                        | Queue::Event
                        | Queue::Error
                )
        )
    }
}

struct PendingAwait {
    token: u64,
    key: Header,
    queue: Queue,
    expected: &'static Layout,
    sender: oneshot::Sender<Result<Record>>,
}

/// The classification and correlation state of a channel.
pub struct Dispatcher {
    route: Route,
    cache: FeatureCache,
    queues: [MessageQueue; 15],
    awaits: Mutex<Vec<PendingAwait>>,
    next_token: AtomicU64,
}

impl Dispatcher {
    pub fn new(route: Route, queue_capacity: usize) -> Self {
        Self {
            route,
            cache: FeatureCache::new(),
            queues: Queue::ALL.map(|kind| MessageQueue::new(kind, queue_capacity)),
            awaits: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    pub fn queue(&self, queue: Queue) -> &MessageQueue {
        &self.queues[queue as usize]
    }

    /// Registers interest in the response to a request with the given header.
    ///
    /// A software ID of 0 in `header` picks the lowest ID that no other pending
    /// await on the same device, feature and function uses. A nonzero ID is
    /// taken as is, unless it is already in use. The returned header carries
    /// the software ID to send the request with.
    pub fn register_await(
        self: &Arc<Self>,
        mut header: Header,
        queue: Queue,
        expected: &'static Layout,
    ) -> Result<(Header, Await)> {
        let mut awaits = self.awaits.lock().unwrap();

        let in_use = |sw_id: u8| {
            awaits.iter().any(|pending| {
                pending.key.device_index == header.device_index
                    && pending.key.feature_index == header.feature_index
                    && pending.key.function_id == header.function_id
                    && pending.key.software_id.value() == sw_id
            })
        };

        let software_id = match header.software_id.value() {
            0 => (1..=U4::MAX.value())
                .find(|&sw_id| !in_use(sw_id))
                .ok_or(Error::NoFreeSoftwareId)?,
            sw_id if in_use(sw_id) => {
                return Err(Error::InvalidArgument(format!(
                    "software ID {} is already awaited for {:?}",
                    sw_id, header
                )));
            },
            sw_id => sw_id,
        };
        header.software_id = U4::from_lo(software_id);

        let (sender, receiver) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        awaits.push(PendingAwait {
            token,
            key: header,
            queue,
            expected,
            sender,
        });

        Ok((header, Await {
            receiver,
            _guard: AwaitGuard {
                dispatcher: Arc::clone(self),
                token,
            },
        }))
    }

    /// Classifies a raw inbound report.
    pub fn dispatch(&self, data: &[u8]) -> Dispatched {
        trace!(data = ?data, "RX");

        let Some(kind) = data.first().copied().and_then(ReportKind::from_report_id) else {
            return self.enqueue(Queue::Hid, Message::Raw(data.to_vec()));
        };

        if data.len() != kind.len() {
            warn!(len = data.len(), kind = ?kind, "dropping HID++ report of the wrong length");
            return Dispatched::Dropped;
        }

        if let Some(dispatched) = self.dispatch_v10(data) {
            return dispatched;
        }

        match Frame::read_raw(data) {
            Ok(frame) => self.dispatch_v20(frame, data),
            Err(err) => {
                warn!(%err, "dropping malformed report");
                Dispatched::Dropped
            },
        }
    }

    /// Fails every pending await and every waiting queue consumer.
    pub fn fail_all(&self, error: impl Fn() -> Error) {
        for pending in self.awaits.lock().unwrap().drain(..) {
            let _ = pending.sender.send(Err(error()));
        }

        for queue in &self.queues {
            queue.fail_waiters(&error);
        }
    }

    /// Fails the pending awaits of a single device with
    /// [`Error::ChannelClosed`].
    pub fn fail_device(&self, device_index: u8) {
        let mut awaits = self.awaits.lock().unwrap();
        let (failed, kept): (Vec<_>, Vec<_>) = awaits
            .drain(..)
            .partition(|pending| pending.key.device_index == device_index);
        *awaits = kept;
        drop(awaits);

        for pending in failed {
            let _ = pending.sender.send(Err(Error::ChannelClosed));
        }
    }

    /// Waits up to `timeout` for a message on `queue` accepted by `filter`.
    pub async fn get_message<F>(&self, queue: Queue, filter: F, timeout: Duration) -> Result<Message>
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        self.queue(queue).get(filter, timeout).await
    }

    pub fn drain(&self, queue: Queue) -> Vec<Message> {
        self.queue(queue).drain()
    }

    pub fn clear_all_queues(&self) {
        for queue in &self.queues {
            queue.clear();
        }
    }

    pub fn is_empty(&self, queue: Queue) -> bool {
        self.queue(queue).is_empty()
    }

    /// The amount of awaits that are still waiting for a response.
    pub fn pending(&self) -> usize {
        self.awaits.lock().unwrap().len()
    }

    fn enqueue(&self, queue: Queue, msg: Message) -> Dispatched {
        self.queue(queue).push(msg);
        Dispatched::Queued(queue)
    }

    /// Whether `feature_index` is a mapped HID++2.0 feature of the device
    /// behind a physical device index.
    fn is_mapped(&self, physical: u8, feature_index: u8) -> bool {
        self.route
            .to_logical(physical)
            .is_some_and(|logical| self.cache.lookup_index(logical, feature_index).is_some())
    }

    fn logical_or_physical(&self, physical: u8) -> u8 {
        self.route.to_logical(physical).unwrap_or(physical)
    }

    /// Handles HID++1.0 traffic. Returns [`None`] if the report is HID++2.0.
    fn dispatch_v10(&self, data: &[u8]) -> Option<Dispatched> {
        let (physical, sub_id) = (data[1], data[2]);
        let typ = MessageType::try_from(sub_id).ok()?;

        let relevant = match typ {
            MessageType::Error => !self.is_mapped(physical, sub_id),
            typ if typ.is_notification() => !self.is_mapped(physical, sub_id),
            typ if typ.is_register() => {
                physical == RECEIVER_DEVICE_INDEX && !self.is_mapped(physical, sub_id)
            },
            _ => false,
        };
        if !relevant {
            return None;
        }

        let msg = match v10::Message::read_raw(data) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(%err, "dropping malformed HID++1.0 message");
                return Some(Dispatched::Dropped);
            },
        };

        Some(match typ {
            MessageType::Error => match v10::parse_error(&msg) {
                Some(mut report) => {
                    report.device_index = self.logical_or_physical(report.device_index);
                    self.report_error(report, Queue::ReceiverError)
                },
                None => Dispatched::Dropped,
            },
            MessageType::DeviceConnection | MessageType::DeviceDisconnection => {
                match ConnectionNotification::parse(&msg) {
                    Some(notification) => self.connection_changed(notification),
                    None => Dispatched::Dropped,
                }
            },
            typ if typ.is_notification() => self.enqueue(Queue::ReceiverEvent, Message::Receiver(msg)),
            _ => self.enqueue(Queue::ReceiverResponse, Message::Receiver(msg)),
        })
    }

    fn connection_changed(&self, notification: ConnectionNotification) -> Dispatched {
        let device_index = self.logical_or_physical(notification.device_index);
        let established = notification.link_established;

        if established {
            debug!(device_index, wpid = notification.wpid, "device link established");
        } else {
            warn!(device_index, "device link lost");
            self.fail_device(device_index);
            self.cache.invalidate_device(device_index);
        }

        self.queue(Queue::Connection)
            .push(Message::Connection(notification));
        Dispatched::Link {
            device_index,
            established,
        }
    }

    fn dispatch_v20(&self, mut frame: Frame, data: &[u8]) -> Dispatched {
        if let Some(mut report) = v20::parse_error(&frame) {
            let Some(logical) = self.route.to_logical(report.device_index) else {
                return self.enqueue(Queue::Generic, Message::Raw(data.to_vec()));
            };
            report.device_index = logical;
            return self.report_error(report, Queue::Error);
        }

        let Some(logical) = self.route.to_logical(frame.header().device_index) else {
            return self.enqueue(Queue::Generic, Message::Raw(data.to_vec()));
        };
        frame.header_mut().device_index = logical;
        let header = frame.header();

        let Some(api) = self.lookup_api(header) else {
            // Unmapped indices are still answered if somebody awaits them, as
            // happens while the feature table is being bootstrapped.
            return match self.complete_record(&frame, None) {
                Some(dispatched) => dispatched,
                None => self.enqueue(Queue::Generic, Message::Raw(data.to_vec())),
            };
        };

        let function_id = header.function_id.value();
        if header.is_event() {
            let layout = api
                .version
                .event(function_id)
                .or_else(|_| api.version.response(function_id));
            return match layout.and_then(|layout| Record::from_frame(layout, &frame)) {
                Ok(record) => self.enqueue(Queue::Event, Message::Hidpp(record)),
                Err(err) => {
                    warn!(%err, header = ?header, "dropping undecodable event");
                    Dispatched::Dropped
                },
            };
        }

        let queue = Queue::from(api.category);
        if let Some(dispatched) = self.complete_record(&frame, Some(queue)) {
            return dispatched;
        }

        match api
            .version
            .response(function_id)
            .and_then(|layout| Record::from_frame(layout, &frame))
        {
            Ok(record) => self.enqueue(queue, Message::Hidpp(record)),
            Err(err) => {
                warn!(%err, header = ?header, "dropping undecodable response");
                Dispatched::Dropped
            },
        }
    }

    fn lookup_api(&self, header: Header) -> Option<MappedApi> {
        let (feature_id, version) = self
            .cache
            .lookup_index(header.device_index, header.feature_index)?;
        let model = registry::lookup(feature_id)?;

        Some(MappedApi {
            category: model.category,
            version: model.factory(version).ok()?,
        })
    }

    /// Offers a HID++2.0 frame to the pending awaits.
    ///
    /// `queue` restricts the candidates to awaits on that queue; [`None`]
    /// matches on the key alone.
    fn complete_record(&self, frame: &Frame, queue: Option<Queue>) -> Option<Dispatched> {
        let key = frame.header();
        let mut awaits = self.awaits.lock().unwrap();
        let pos = awaits
            .iter()
            .position(|pending| pending.key == key && queue.is_none_or(|q| q == pending.queue))?;

        match Record::from_frame(awaits[pos].expected, frame) {
            Ok(record) => {
                let pending = awaits.remove(pos);
                let _ = pending.sender.send(Ok(record));
                Some(Dispatched::Answered)
            },
            Err(err) => {
                warn!(%err, expected = awaits[pos].expected.name(), "dropping undecodable response");
                Some(Dispatched::Dropped)
            },
        }
    }

    fn report_error(&self, report: ErrorReport, fallback: Queue) -> Dispatched {
        debug!(report = ?report, kind = ?report.kind(), "error report");

        let mut awaits = self.awaits.lock().unwrap();
        if let Some(pos) = awaits.iter().position(|pending| pending.key == report.key()) {
            let pending = awaits.remove(pos);
            let _ = pending.sender.send(Err(Error::Protocol(report)));
            return Dispatched::Answered;
        }
        drop(awaits);

        self.enqueue(fallback, Message::Error(report))
    }

    fn remove_await(&self, token: u64) {
        self.awaits
            .lock()
            .unwrap()
            .retain(|pending| pending.token != token);
    }
}

struct MappedApi {
    category: Category,
    version: &'static VersionApi,
}

/// A registered interest in a single response.
///
/// Dropping it before completion unregisters it.
pub struct Await {
    receiver: oneshot::Receiver<Result<Record>>,
    _guard: AwaitGuard,
}

impl Await {
    /// Waits for the response, an error report or the channel going away.
    pub async fn recv(self) -> Result<Record> {
        let Await { receiver, _guard } = self;
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(Error::ChannelClosed),
        }
    }
}

struct AwaitGuard {
    dispatcher: Arc<Dispatcher>,
    token: u64,
}

impl Drop for AwaitGuard {
    fn drop(&mut self) {
        self.dispatcher.remove_await(self.token);
    }
}
