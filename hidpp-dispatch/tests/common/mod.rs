//! A scripted HID++2.0 device living entirely in memory.

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hidpp_dispatch::{
    async_trait,
    channel::{Channel, ChannelConfig, RawHidChannel, Route, TransportError},
    feature::registry,
};

pub const DEVICE_INDEX: u8 = 0x01;

/// Produces the reports the device answers a written report with.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

pub struct MockDevice {
    inbound: flume::Receiver<Vec<u8>>,
    loopback: flume::Sender<Vec<u8>>,
    responder: Mutex<Responder>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// The test side of a [`MockDevice`].
#[derive(Clone)]
pub struct MockHandle {
    inbound: flume::Sender<Vec<u8>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockHandle {
    /// Makes the device send a report on its own.
    pub fn inject(&self, report: &[u8]) {
        self.inbound.send(report.to_vec()).unwrap();
    }

    /// Makes the next transport read return zero bytes.
    pub fn disconnect(&self) {
        self.inbound.send(Vec::new()).unwrap();
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

impl MockDevice {
    pub fn new(responder: Responder) -> (Self, MockHandle) {
        let (tx, rx) = flume::unbounded();
        let written = Arc::new(Mutex::new(Vec::new()));

        (
            Self {
                inbound: rx,
                loopback: tx.clone(),
                responder: Mutex::new(responder),
                written: Arc::clone(&written),
            },
            MockHandle {
                inbound: tx,
                written,
            },
        )
    }
}

#[async_trait]
impl RawHidChannel for MockDevice {
    fn vendor_id(&self) -> u16 {
        0x046d
    }

    fn product_id(&self) -> u16 {
        0xc548
    }

    async fn write_report(&self, src: &[u8]) -> Result<usize, TransportError> {
        self.written.lock().unwrap().push(src.to_vec());

        let responses = {
            let mut responder = self.responder.lock().unwrap();
            (*responder)(src)
        };
        for response in responses {
            self.loopback.send(response)?;
        }

        Ok(src.len())
    }

    async fn read_report(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let report = self.inbound.recv_async().await?;
        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }

    fn supports_short_long_hidpp(&self) -> Option<(bool, bool)> {
        Some((true, true))
    }

    async fn get_report_descriptor(&self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Err("the mock device has no report descriptor".into())
    }
}

/// A long report answering `request` with `payload`.
pub fn long_response(request: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut report = vec![0u8; 20];
    report[0] = 0x11;
    report[1..4].copy_from_slice(&request[1..4]);
    report[4..4 + payload.len()].copy_from_slice(payload);
    report
}

/// A HID++2.0 error report rejecting `request`.
pub fn error_response(request: &[u8], code: u8) -> Vec<u8> {
    let mut report = vec![0u8; 20];
    report[0] = 0x11;
    report[1] = request[1];
    report[2] = 0xff;
    report[3] = request[2];
    report[4] = request[3];
    report[5] = code;
    report
}

/// Emulates the feature table of a device.
///
/// `features[i]` is the `(feature ID, version)` living at feature index
/// `i + 1`; Root is implied at index 0 in version 2. Root and FeatureSet are
/// answered properly, functions out of range with an invalid-function error,
/// and anything else with an all-zero payload.
pub fn feature_table(features: &'static [(u16, u8)]) -> impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send {
    move |request: &[u8]| {
        let (feature_index, function) = (request[2], request[3] >> 4);

        let response = match (feature_index, function) {
            // GetFeature
            (0x00, 0) => {
                let feature_id = u16::from_be_bytes([request[4], request[5]]);
                match feature_id {
                    0x0000 => long_response(request, &[0x00, 0x00, 0x02]),
                    _ => match features.iter().position(|&(id, _)| id == feature_id) {
                        Some(pos) => long_response(request, &[pos as u8 + 1, 0x00, features[pos].1]),
                        None => long_response(request, &[0x00, 0x00, 0x00]),
                    },
                }
            },
            // GetProtocolVersion
            (0x00, 1) => long_response(request, &[0x04, 0x02, request[6]]),
            (0x00, _) => error_response(request, 0x07),
            (index, function) => match features.get(usize::from(index) - 1) {
                Some(&(feature_id, version)) => {
                    let max = registry::factory(feature_id, version)
                        .map(|api| api.max_function_index())
                        .unwrap_or(0);

                    if function > max {
                        error_response(request, 0x07)
                    } else if feature_id == 0x0001 && function == 0 {
                        long_response(request, &[features.len() as u8])
                    } else if feature_id == 0x0001 && function == 1 {
                        let (id, version) = features[usize::from(request[4]) - 1];
                        let [hi, lo] = id.to_be_bytes();
                        long_response(request, &[hi, lo, 0x00, version])
                    } else {
                        long_response(request, &[])
                    }
                },
                None => error_response(request, 0x01),
            },
        };

        vec![response]
    }
}

pub fn config() -> ChannelConfig {
    ChannelConfig::default()
        .with_response_timeout(Duration::from_millis(500))
        .with_read_error_backoff(Duration::from_millis(5))
}

/// Opens a channel to a mock device answering with `responder`.
pub async fn open(responder: Responder) -> (Arc<Channel>, MockHandle) {
    open_with(responder, Route::Direct { device_index: DEVICE_INDEX }, config()).await
}

pub async fn open_with(
    responder: Responder,
    route: Route,
    config: ChannelConfig,
) -> (Arc<Channel>, MockHandle) {
    let (device, handle) = MockDevice::new(responder);
    let channel = Arc::new(Channel::new(device, route, config));
    channel.open().await.unwrap();
    (channel, handle)
}

/// A device that never answers.
pub fn silent() -> Responder {
    Box::new(|_: &[u8]| Vec::<Vec<u8>>::new())
}
