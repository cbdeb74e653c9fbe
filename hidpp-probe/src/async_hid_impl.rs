//! Implements HID communication using the `async-hid` crate.

use std::{error::Error, fs::File, io::Read};

use anyhow::{Result, anyhow};
use async_hid::{
    AsyncHidRead,
    AsyncHidWrite,
    Device,
    DeviceId,
    DeviceInfo,
    DeviceReader,
    DeviceWriter,
    HidBackend,
};
use futures_lite::StreamExt;
use hidpp_dispatch::{
    Error as HidppError,
    async_trait,
    channel::{Channel, ChannelConfig, RawHidChannel, Route},
};
use itertools::Itertools;
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct AsyncHidDevice {
    reader: Mutex<DeviceReader>,
    writer: Mutex<DeviceWriter>,
    info: DeviceInfo,
}

#[async_trait]
impl RawHidChannel for AsyncHidDevice {
    fn vendor_id(&self) -> u16 {
        self.info.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.info.product_id
    }

    async fn write_report(&self, src: &[u8]) -> Result<usize, Box<dyn Error + Sync + Send>> {
        let mut guard = self.writer.lock().await;
        guard.write_output_report(src).await?;
        Ok(src.len())
    }

    async fn read_report(&self, buf: &mut [u8]) -> Result<usize, Box<dyn Error + Sync + Send>> {
        let mut guard = self.reader.lock().await;
        Ok(guard.read_input_report(buf).await?)
    }

    fn supports_short_long_hidpp(&self) -> Option<(bool, bool)> {
        None
    }

    async fn get_report_descriptor(
        &self,
        buf: &mut [u8],
    ) -> Result<usize, Box<dyn Error + Sync + Send>> {
        let DeviceId::DevPath(ref path) = self.info.id else {
            return Err(
                anyhow!("report descriptors are currently only supported on Linux")
                    .into_boxed_dyn_error(),
            );
        };

        let mut file = File::open(path.join("device/report_descriptor"))?;
        Ok(file.read(buf)?)
    }
}

/// Opens a [`Channel`] on every local HID interface that speaks HID++.
pub async fn enumerate_hidpp(route: Route, config: ChannelConfig) -> Result<Vec<Channel>> {
    let hid = HidBackend::default();
    let devices: Vec<Device> = hid
        .enumerate()
        .await?
        .collect::<Vec<Device>>()
        .await
        .into_iter()
        .unique_by(|x| x.id.clone())
        .collect();

    let mut channels = Vec::new();
    for dev in devices {
        let (reader, writer) = match dev.open().await {
            Ok(opened) => opened,
            Err(err) => {
                warn!(name = %dev.name, %err, "could not open HID interface");
                continue;
            },
        };

        let name = dev.name.clone();
        let channel = Channel::new(
            AsyncHidDevice {
                reader: Mutex::new(reader),
                writer: Mutex::new(writer),
                info: dev.to_device_info(),
            },
            route,
            config,
        );

        match channel.open().await {
            Ok(()) => channels.push(channel),
            Err(HidppError::HidppNotSupported) => {
                debug!(name = %name, "interface does not speak HID++");
            },
            Err(other) => {
                return Err(anyhow::Error::new(other).context("could not open the HID++ channel"));
            },
        }
    }

    Ok(channels)
}
