//! Drives a channel against a scripted device.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use common::{DEVICE_INDEX, error_response, feature_table, long_response};
use hidpp_dispatch::{
    Error,
    cache::FeatureEntry,
    channel::{ChannelState, Route},
    feature::{Category, adjustable_dpi, feature_set, multi_platform, root},
    nibble::U4,
    protocol::{self, ErrorKind, ErrorProtocol, ProtocolVersion},
    queue::{Message, Queue},
};

const FEATURES: &[(u16, u8)] = &[
    (feature_set::FEATURE_ID, 1),
    (adjustable_dpi::FEATURE_ID, 0),
    (multi_platform::FEATURE_ID, 1),
];

const TIMEOUT: Duration = Duration::from_millis(500);

#[tokio::test]
async fn root_maps_feature_set() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;

    let mut request = root::get_feature(DEVICE_INDEX, feature_set::FEATURE_ID).unwrap();
    let mut header = request.header().unwrap();
    header.software_id = U4::from_lo(0x1);
    request.set_header(header).unwrap();

    let response = channel
        .send_and_wait(request, &root::GET_FEATURE_RESPONSE_V1, Category::Important, TIMEOUT)
        .await
        .unwrap();
    let info = root::FeatureInformation::from_record(&response).unwrap();
    assert_eq!(info.index, 0x01);
    assert_eq!(info.version, 1);
    assert_eq!(response.header().unwrap().software_id.value(), 0x1);

    assert_eq!(handle.written(), vec![vec![0x10, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00]]);

    assert_eq!(channel.update_feature_mapping(feature_set::FEATURE_ID).await.unwrap(), 0x01);
    assert_eq!(
        channel.cache().get(DEVICE_INDEX, feature_set::FEATURE_ID),
        Some(FeatureEntry::Supported { index: 0x01, version: 1 })
    );
}

#[tokio::test]
async fn unsupported_feature_is_remembered() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;

    assert!(matches!(
        channel.update_feature_mapping(0xdead).await,
        Err(Error::UnsupportedFeature { feature_id: 0xdead })
    ));
    let writes = handle.written().len();
    assert_eq!(writes, 2);

    assert!(matches!(
        channel.request(0xdead, 0).await,
        Err(Error::UnsupportedFeature { feature_id: 0xdead })
    ));
    assert_eq!(handle.written().len(), writes);
}

#[tokio::test]
async fn function_out_of_range_is_a_protocol_error() {
    let (channel, _handle) = common::open(Box::new(feature_table(FEATURES))).await;

    let mut request = channel.request(adjustable_dpi::FEATURE_ID, 0).await.unwrap();
    let mut header = request.header().unwrap();
    header.function_id = U4::from_lo(0x0f);
    request.set_header(header).unwrap();

    let Err(Error::Protocol(report)) = channel
        .send_and_wait(request, &adjustable_dpi::GET_SENSOR_COUNT_RESPONSE, Category::Mouse, TIMEOUT)
        .await
    else {
        panic!("expected a protocol error");
    };
    assert_eq!(report.protocol, ErrorProtocol::V20);
    assert_eq!(report.code, 0x07);
    assert_eq!(report.kind(), ErrorKind::InvalidFunction);
    assert_eq!(report.function_id.value(), 0x0f);

    assert!(matches!(
        channel.request(adjustable_dpi::FEATURE_ID, 0x0f).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn concurrent_awaits_receive_their_own_responses() {
    let held = Arc::new(Mutex::new(Vec::new()));
    let mut table = feature_table(FEATURES);
    let responder = {
        let held = Arc::clone(&held);
        move |request: &[u8]| {
            if request[2] != 0x02 || request[3] >> 4 != 0 {
                return table(request);
            }

            // Tags every answer with the software ID it answers.
            let mut held = held.lock().unwrap();
            held.push(long_response(request, &[request[3] & 0x0f]));
            if held.len() < 2 {
                return Vec::new();
            }
            held.drain(..).rev().collect()
        }
    };
    let (channel, _handle) = common::open(Box::new(responder)).await;

    let mut tasks = Vec::new();
    for sw_id in [1, 2] {
        let mut request = channel.request(adjustable_dpi::FEATURE_ID, 0).await.unwrap();
        let mut header = request.header().unwrap();
        header.software_id = U4::from_lo(sw_id);
        request.set_header(header).unwrap();

        let channel = Arc::clone(&channel);
        tasks.push(tokio::spawn(async move {
            channel
                .send_and_wait(request, &adjustable_dpi::GET_SENSOR_COUNT_RESPONSE, Category::Mouse, TIMEOUT)
                .await
        }));
    }

    for (task, sw_id) in tasks.into_iter().zip([1, 2]) {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.header().unwrap().software_id.value(), sw_id);
        assert_eq!(response.get("sensor_count").unwrap(), u128::from(sw_id));
    }
    assert!(channel.drain(Queue::Mouse).is_empty());
}

#[tokio::test]
async fn payload_size_picks_the_report() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;

    let short = root::get_feature(DEVICE_INDEX, 0x2201).unwrap();
    let bytes = short.to_frame(false).unwrap().to_bytes();
    assert_eq!(bytes.len(), 7);
    assert_eq!(bytes[0], 0x10);

    let long = hidpp_dispatch::record::Record::new(&root::GET_FEATURE_RESPONSE_V1);
    let bytes = long.to_frame(false).unwrap().to_bytes();
    assert_eq!(bytes.len(), 20);
    assert_eq!(bytes[0], 0x11);

    channel.send_only(short).await.unwrap();
    let written = handle.written();
    assert_eq!(written.last().unwrap().len(), 7);
}

#[tokio::test]
async fn forced_long_reports() {
    let (channel, handle) = common::open_with(
        Box::new(feature_table(FEATURES)),
        Route::Direct { device_index: DEVICE_INDEX },
        common::config().with_force_long(true),
    )
    .await;

    channel.update_feature_mapping(adjustable_dpi::FEATURE_ID).await.unwrap();
    assert!(handle.written().iter().all(|report| report.len() == 20 && report[0] == 0x11));
}

#[tokio::test]
async fn disconnect_fails_pending_awaits() {
    let mut table = feature_table(FEATURES);
    // GetSensorDpi is never answered.
    let responder = move |request: &[u8]| {
        if request[2] == 0x02 && request[3] >> 4 == 2 {
            return Vec::new();
        }
        table(request)
    };
    let (channel, handle) = common::open(Box::new(responder)).await;
    let states = channel.listen();

    let request = channel
        .request(adjustable_dpi::FEATURE_ID, adjustable_dpi::GET_SENSOR_DPI)
        .await
        .unwrap();
    assert!(!channel.cache().is_empty());

    let timeout = Duration::from_secs(2);
    let pending = tokio::spawn({
        let channel = Arc::clone(&channel);
        async move {
            let started = Instant::now();
            let res = channel
                .send_and_wait(request, &adjustable_dpi::GET_SENSOR_DPI_RESPONSE_V0, Category::Mouse, timeout)
                .await;
            (res, started.elapsed())
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.disconnect();

    let (res, elapsed) = pending.await.unwrap();
    assert!(matches!(res, Err(Error::ChannelClosed)));
    assert!(elapsed < timeout);
    assert!(channel.cache().is_empty());
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(states.recv_async().await.unwrap(), ChannelState::Disconnected);

    assert!(matches!(
        channel.send_only(root::ping(DEVICE_INDEX, 0x5a).unwrap()).await,
        Err(Error::ChannelClosed)
    ));

    // The receiver reports the link as established again.
    handle.inject(&[0x10, DEVICE_INDEX, 0x41, 0x10, 0x02, 0x8a, 0x40]);
    assert_eq!(states.recv_async().await.unwrap(), ChannelState::Open);
    assert_eq!(channel.update_feature_mapping(adjustable_dpi::FEATURE_ID).await.unwrap(), 0x02);
}

#[tokio::test]
async fn link_loss_notification_disconnects() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;
    channel.update_feature_mapping(adjustable_dpi::FEATURE_ID).await.unwrap();
    let states = channel.listen();

    handle.inject(&[0x10, DEVICE_INDEX, 0x41, 0x10, 0x42, 0x8a, 0x40]);
    assert_eq!(states.recv_async().await.unwrap(), ChannelState::Disconnected);
    assert!(channel.cache().is_empty());

    let Message::Connection(notification) = channel.get_message(Queue::Connection, TIMEOUT).await.unwrap() else {
        panic!("expected a connection notification");
    };
    assert!(!notification.link_established);
    assert_eq!(notification.wpid, 0x408a);
}

#[tokio::test]
async fn close_fails_pending_awaits() {
    let (channel, _handle) = common::open(common::silent()).await;

    let pending = tokio::spawn({
        let channel = Arc::clone(&channel);
        async move {
            channel
                .send_and_wait(root::ping(DEVICE_INDEX, 0x01).unwrap(), &root::GET_PROTOCOL_VERSION_RESPONSE, Category::Important, Duration::from_secs(2))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    channel.close().await;
    assert!(matches!(pending.await.unwrap(), Err(Error::ChannelClosed)));
    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(matches!(
        channel.send_only(root::ping(DEVICE_INDEX, 0x01).unwrap()).await,
        Err(Error::ChannelClosed)
    ));
}

#[tokio::test]
async fn unanswered_requests_time_out() {
    let (channel, handle) = common::open_with(
        common::silent(),
        Route::Direct { device_index: DEVICE_INDEX },
        common::config().with_retries(1),
    )
    .await;

    let res = channel
        .send_and_wait(root::ping(DEVICE_INDEX, 0x01).unwrap(), &root::GET_PROTOCOL_VERSION_RESPONSE, Category::Important, Duration::from_millis(50))
        .await;
    assert!(matches!(res, Err(Error::Timeout)));
    assert_eq!(handle.written().len(), 2);
}

#[tokio::test]
async fn protocol_version_is_determined() {
    let (channel, _handle) = common::open(Box::new(feature_table(FEATURES))).await;
    assert_eq!(
        protocol::determine_version(&channel, TIMEOUT).await.unwrap(),
        Some(ProtocolVersion::V20 { protocol_num: 4, target_sw: 2 })
    );

    // A HID++1.0 receiver rejects sub ID 0x00.
    let responder = |request: &[u8]| vec![vec![0x10, request[1], 0x8f, request[2], request[3], 0x01, 0x00]];
    let (channel, _handle) = common::open(Box::new(responder)).await;
    assert_eq!(
        protocol::determine_version(&channel, TIMEOUT).await.unwrap(),
        Some(ProtocolVersion::V10)
    );

    let (channel, _handle) = common::open(common::silent()).await;
    assert_eq!(
        protocol::determine_version(&channel, Duration::from_millis(50)).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn feature_table_is_enumerated() {
    let (channel, _handle) = common::open(Box::new(feature_table(FEATURES))).await;

    let features = feature_set::enumerate(&channel).await.unwrap();
    let ids: Vec<_> = features.iter().map(|(index, info)| (*index, info.id, info.version)).collect();
    assert_eq!(ids, vec![(1, 0x0001, 1), (2, 0x2201, 0), (3, 0x4531, 1)]);
}

#[tokio::test]
async fn events_are_decoded_with_the_event_table() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;
    assert_eq!(channel.update_feature_mapping(multi_platform::FEATURE_ID).await.unwrap(), 0x03);

    let mut event = [0u8; 20];
    event[..7].copy_from_slice(&[0x11, DEVICE_INDEX, 0x03, 0x00, 0x01, 0x04, 0x02]);
    handle.inject(&event);

    let record = channel
        .await_event(&multi_platform::PLATFORM_CHANGE_EVENT_REPORT, TIMEOUT)
        .await
        .unwrap();
    let change = multi_platform::PlatformChange::from_record(&record).unwrap();
    assert_eq!(change.host_index, 0x01);
    assert_eq!(change.platform_index, 0x04);
    assert_eq!(change.platform_source, multi_platform::PlatformSource::Manual);
}

#[tokio::test]
async fn unawaited_errors_are_queued() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;

    handle.inject(&error_response(&[0x10, DEVICE_INDEX, 0x02, 0x35, 0, 0, 0], 0x05));
    let Message::Error(report) = channel.get_message(Queue::Error, TIMEOUT).await.unwrap() else {
        panic!("expected an error report");
    };
    assert_eq!(report.kind(), ErrorKind::NotAllowed);
    assert_eq!(report.software_id.value(), 0x5);

    handle.inject(&[0x02, 0x00, 0x01]);
    assert_eq!(
        channel.get_message(Queue::Hid, TIMEOUT).await.unwrap(),
        Message::Raw(vec![0x02, 0x00, 0x01])
    );
}

#[tokio::test]
async fn dpi_through_a_receiver_slot() {
    let mut table = feature_table(FEATURES);
    let responder = move |request: &[u8]| {
        assert_eq!(request[1], 0x03);
        if request[2] == 0x02 && request[3] >> 4 == 2 {
            return vec![long_response(request, &[request[4], 0x03, 0x20])];
        }
        table(request)
    };
    let (channel, handle) = common::open_with(
        Box::new(responder),
        Route::ThroughReceiver { slot: 0x03 },
        common::config(),
    )
    .await;
    assert_eq!(channel.device_index(), 0xff);

    let dpi = adjustable_dpi::get_sensor_dpi(&channel, 0).await.unwrap();
    assert_eq!(dpi.dpi, 800);
    assert_eq!(dpi.default_dpi, None);
    assert!(handle.written().iter().all(|report| report[1] == 0x03));

    // Traffic of other slots is left alone.
    handle.inject(&[0x10, 0x04, 0x02, 0x21, 0x00, 0x00, 0x00]);
    assert_eq!(
        channel.get_message(Queue::Generic, TIMEOUT).await.unwrap(),
        Message::Raw(vec![0x10, 0x04, 0x02, 0x21, 0x00, 0x00, 0x00])
    );
}

#[tokio::test]
async fn oversized_header_values_are_never_sent() {
    let (channel, handle) = common::open(common::silent()).await;

    let wide_device = root::ping(DEVICE_INDEX, 0x5a).unwrap().with("device_index", 0x101).unwrap();
    let res = channel
        .send_and_wait(wide_device, &root::GET_PROTOCOL_VERSION_RESPONSE, Category::Important, TIMEOUT)
        .await;
    assert!(matches!(res, Err(Error::InvalidArgument(_))));

    let wide_function = root::ping(DEVICE_INDEX, 0x5a).unwrap().with("function_index", 0x12).unwrap();
    let res = channel
        .send_and_wait(wide_function, &root::GET_PROTOCOL_VERSION_RESPONSE, Category::Important, TIMEOUT)
        .await;
    assert!(matches!(res, Err(Error::InvalidArgument(_))));

    assert!(handle.written().is_empty());
}

#[tokio::test]
async fn reset_feature_cache_asks_the_device_again() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;

    assert_eq!(channel.update_feature_mapping(adjustable_dpi::FEATURE_ID).await.unwrap(), 0x02);
    let writes = handle.written().len();
    assert_eq!(channel.update_feature_mapping(adjustable_dpi::FEATURE_ID).await.unwrap(), 0x02);
    assert_eq!(handle.written().len(), writes);

    channel.reset_feature_cache();
    assert!(channel.cache().is_empty());

    assert_eq!(channel.update_feature_mapping(adjustable_dpi::FEATURE_ID).await.unwrap(), 0x02);
    let written = handle.written();
    assert!(written.len() > writes);
    let lookup = written.last().unwrap();
    assert_eq!(lookup[2], 0x00);
    assert_eq!(&lookup[4..6], &[0x22, 0x01]);
}

#[tokio::test]
async fn sensor_dpi_is_set() {
    let (channel, handle) = common::open(Box::new(feature_table(FEATURES))).await;

    let response = adjustable_dpi::set_sensor_dpi(&channel, 0, 800).await.unwrap();
    assert_eq!(response.layout().name(), "SetSensorDpiResponseV0");
    assert_eq!(response.header().unwrap().feature_index, 0x02);
    assert_eq!(
        handle.written().last().unwrap(),
        &vec![0x10, DEVICE_INDEX, 0x02, 0x31, 0x00, 0x03, 0x20]
    );

    let writes = handle.written().len();
    assert!(matches!(
        adjustable_dpi::set_sensor_dpi(&channel, 0, 0).await,
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(handle.written().len(), writes);
}

#[tokio::test]
async fn dropping_one_await_leaves_the_other_pending() {
    let held = Arc::new(Mutex::new(Vec::new()));
    let mut table = feature_table(FEATURES);
    let responder = {
        let held = Arc::clone(&held);
        move |request: &[u8]| {
            if request[2] == 0x02 && request[3] >> 4 == adjustable_dpi::GET_SENSOR_DPI {
                held.lock().unwrap().push(request.to_vec());
                return Vec::new();
            }
            table(request)
        }
    };
    let (channel, handle) = common::open(Box::new(responder)).await;

    let mut tasks = Vec::new();
    for sw_id in [1, 2] {
        let mut request = channel
            .request(adjustable_dpi::FEATURE_ID, adjustable_dpi::GET_SENSOR_DPI)
            .await
            .unwrap();
        let mut header = request.header().unwrap();
        header.software_id = U4::from_lo(sw_id);
        request.set_header(header).unwrap();

        let channel = Arc::clone(&channel);
        tasks.push(tokio::spawn(async move {
            channel
                .send_and_wait(request, &adjustable_dpi::GET_SENSOR_DPI_RESPONSE_V0, Category::Mouse, Duration::from_secs(2))
                .await
        }));
    }
    while held.lock().unwrap().len() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let kept = tasks.pop().unwrap();
    let dropped = tasks.pop().unwrap();
    dropped.abort();
    assert!(dropped.await.unwrap_err().is_cancelled());

    let mut requests = held.lock().unwrap().clone();
    requests.sort_by_key(|request| request[3] & 0x0f);
    for request in &requests {
        handle.inject(&long_response(request, &[0x00, 0x03, 0x20]));
    }

    let response = kept.await.unwrap().unwrap();
    assert_eq!(response.header().unwrap().software_id.value(), 2);
    assert_eq!(response.get("dpi").unwrap(), 800);

    // The answer nobody waits for anymore ends up in the category queue.
    let Message::Hidpp(orphan) = channel.get_message(Queue::Mouse, TIMEOUT).await.unwrap() else {
        panic!("expected a decoded response");
    };
    assert_eq!(orphan.header().unwrap().software_id.value(), 1);
}
