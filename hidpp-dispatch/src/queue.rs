//! Bounded message queues the dispatcher sorts inbound traffic into.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::channel::oneshot;
use tracing::{error, warn};

use crate::{
    error::{Error, Result},
    feature::Category,
    protocol::{ErrorReport, v10},
    record::Record,
};

/// Identifies one of the queues of a dispatcher.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Queue {
    Important,
    Common,
    Mouse,
    Keyboard,
    Touchpad,
    Gaming,
    Peripheral,

    /// HID++2.0 events (software ID 0).
    Event,

    /// Reports that are not HID++ at all.
    Hid,

    /// HID++2.0 error reports nobody waited for.
    Error,

    /// Receiver connection notifications.
    Connection,
    ReceiverEvent,
    ReceiverError,
    ReceiverResponse,

    /// HID++2.0 traffic of feature indices that are not mapped.
    Generic,
}

impl Queue {
    pub const ALL: [Queue; 15] = [
        Self::Important,
        Self::Common,
        Self::Mouse,
        Self::Keyboard,
        Self::Touchpad,
        Self::Gaming,
        Self::Peripheral,
        Self::Event,
        Self::Hid,
        Self::Error,
        Self::Connection,
        Self::ReceiverEvent,
        Self::ReceiverError,
        Self::ReceiverResponse,
        Self::Generic,
    ];

    /// Whether a full queue makes room by dropping its oldest entry instead
    /// of rejecting the new one.
    pub fn drops_oldest(self) -> bool {
        matches!(
            self,
            Self::Event | Self::Hid | Self::Connection | Self::ReceiverEvent | Self::Generic
        )
    }
}

impl From<Category> for Queue {
    fn from(category: Category) -> Self {
        match category {
            Category::Important => Self::Important,
            Category::Common => Self::Common,
            Category::Mouse => Self::Mouse,
            Category::Keyboard => Self::Keyboard,
            Category::Touchpad => Self::Touchpad,
            Category::Gaming => Self::Gaming,
            Category::Peripheral => Self::Peripheral,
        }
    }
}

/// An inbound report after classification.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Message {
    /// A decoded HID++2.0 response or event.
    Hidpp(Record),

    /// A HID++1.0 or HID++2.0 error report.
    Error(ErrorReport),

    /// A HID++1.0 message of a receiver.
    Receiver(v10::Message),

    /// A parsed device connection or disconnection notification.
    Connection(v10::ConnectionNotification),

    /// Bytes that were not decoded, either because they are not HID++ or
    /// because their feature index is not mapped.
    Raw(Vec<u8>),
}

impl Message {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Hidpp(record) => Some(record),
            _ => None,
        }
    }
}

type Filter = Box<dyn Fn(&Message) -> bool + Send>;

struct Waiter {
    token: u64,
    filter: Filter,
    sender: oneshot::Sender<Result<Message>>,
}

struct State {
    items: VecDeque<Message>,
    waiters: Vec<Waiter>,
}

/// A bounded FIFO queue with filtered, timed consumers.
///
/// A pushed message is handed to the oldest waiting consumer whose filter
/// accepts it, and stored otherwise.
pub struct MessageQueue {
    kind: Queue,
    capacity: usize,
    state: Mutex<State>,
    next_token: AtomicU64,
}

impl MessageQueue {
    pub fn new(kind: Queue, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            state: Mutex::new(State {
                items: VecDeque::new(),
                waiters: Vec::new(),
            }),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> Queue {
        self.kind
    }

    pub fn push(&self, mut msg: Message) {
        let mut state = self.state.lock().unwrap();

        while let Some(pos) = state.waiters.iter().position(|waiter| (waiter.filter)(&msg)) {
            let waiter = state.waiters.remove(pos);
            match waiter.sender.send(Ok(msg)) {
                Ok(()) => return,
                // The consumer went away between timing out and removing itself.
                Err(Ok(returned)) => msg = returned,
                Err(Err(_)) => return,
            }
        }

        if state.items.len() < self.capacity {
            state.items.push_back(msg);
        } else if self.kind.drops_oldest() {
            warn!(queue = ?self.kind, capacity = self.capacity, "queue full, dropping oldest message");
            state.items.pop_front();
            state.items.push_back(msg);
        } else {
            error!(queue = ?self.kind, capacity = self.capacity, "queue full, rejecting message");
            for waiter in state.waiters.drain(..) {
                let _ = waiter.sender.send(Err(Error::QueueOverflow(self.kind)));
            }
        }
    }

    /// Takes the oldest stored message accepted by `filter`.
    pub fn try_get(&self, filter: impl Fn(&Message) -> bool) -> Option<Message> {
        let mut state = self.state.lock().unwrap();
        let pos = state.items.iter().position(filter)?;
        state.items.remove(pos)
    }

    /// Waits up to `timeout` for a message accepted by `filter`.
    ///
    /// Cancelling the returned future removes the consumer from the queue.
    pub async fn get<F>(&self, filter: F, timeout: Duration) -> Result<Message>
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        let (token, receiver) = {
            let mut state = self.state.lock().unwrap();
            let pos = state.items.iter().position(&filter);
            if let Some(msg) = pos.and_then(|pos| state.items.remove(pos)) {
                return Ok(msg);
            }

            let (sender, receiver) = oneshot::channel();
            let token = self.next_token.fetch_add(1, Ordering::Relaxed);
            state.waiters.push(Waiter {
                token,
                filter: Box::new(filter),
                sender,
            });
            (token, receiver)
        };

        let _guard = WaiterGuard { queue: self, token };
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Removes and returns every stored message.
    pub fn drain(&self) -> Vec<Message> {
        self.state.lock().unwrap().items.drain(..).collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    /// Fails every waiting consumer with the error produced by `error`.
    pub fn fail_waiters(&self, error: impl Fn() -> Error) {
        let mut state = self.state.lock().unwrap();
        for waiter in state.waiters.drain(..) {
            let _ = waiter.sender.send(Err(error()));
        }
    }

    fn remove_waiter(&self, token: u64) {
        self.state
            .lock()
            .unwrap()
            .waiters
            .retain(|waiter| waiter.token != token);
    }
}

struct WaiterGuard<'a> {
    queue: &'a MessageQueue,
    token: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.queue.remove_waiter(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(byte: u8) -> Message {
        Message::Raw(vec![byte])
    }

    #[test]
    fn event_queues_drop_the_oldest() {
        let queue = MessageQueue::new(Queue::Event, 2);
        queue.push(raw(1));
        queue.push(raw(2));
        queue.push(raw(3));

        assert_eq!(queue.drain(), vec![raw(2), raw(3)]);
    }

    #[test]
    fn response_queues_reject_the_newest() {
        let queue = MessageQueue::new(Queue::Mouse, 2);
        queue.push(raw(1));
        queue.push(raw(2));
        queue.push(raw(3));

        assert_eq!(queue.drain(), vec![raw(1), raw(2)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn try_get_respects_the_filter() {
        let queue = MessageQueue::new(Queue::Generic, 4);
        queue.push(raw(1));
        queue.push(raw(2));

        assert_eq!(queue.try_get(|msg| *msg == raw(2)), Some(raw(2)));
        assert_eq!(queue.try_get(|msg| *msg == raw(2)), None);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn waiting_consumer_receives_pushed_message() {
        let queue = std::sync::Arc::new(MessageQueue::new(Queue::Hid, 4));

        let consumer = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .get(|msg| *msg == raw(7), Duration::from_secs(1))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.push(raw(6));
        queue.push(raw(7));

        assert_eq!(consumer.await.unwrap().unwrap(), raw(7));
        assert_eq!(queue.drain(), vec![raw(6)]);
    }

    #[tokio::test]
    async fn overflow_fails_waiting_consumers() {
        let queue = std::sync::Arc::new(MessageQueue::new(Queue::Error, 1));
        queue.push(raw(1));

        let consumer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get(|msg| *msg == raw(9), Duration::from_secs(1)).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.push(raw(2));
        assert!(matches!(
            consumer.await.unwrap(),
            Err(Error::QueueOverflow(Queue::Error))
        ));
    }

    #[tokio::test]
    async fn timed_out_consumer_is_removed() {
        let queue = MessageQueue::new(Queue::Event, 4);
        let res = queue.get(|_| true, Duration::from_millis(10)).await;
        assert!(matches!(res, Err(Error::Timeout)));

        queue.push(raw(1));
        assert_eq!(queue.len(), 1);
    }
}
