use std::{
    io::{BufWriter, Write},
    time::Duration,
};

use anyhow::Result;
use clap::Args;
use hidpp_dispatch::{
    Error as HidppError,
    channel::{Channel, ChannelConfig, DIRECT_DEVICE_INDEX, Route},
    feature::{FeatureType, feature_set, registry, root},
    protocol::{self, ProtocolVersion},
};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::Cli;
use crate::async_hid_impl::enumerate_hidpp;

/// Detect HID++ interfaces and view their protocol version and feature table.
#[derive(Args)]
pub struct ProbeCommand {
    /// Address the device in this receiver slot instead of the interface
    /// itself
    #[arg(short, long)]
    slot: Option<u8>,

    /// How long to wait for every response, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    timeout: u64,

    /// How often to resend a request that was not answered
    #[arg(short, long, default_value_t = 0)]
    retries: u8,
}

impl ProbeCommand {
    pub async fn execute(&self, root: &Cli) -> Result<()> {
        let mut stdout = BufWriter::new(anstream::stdout());

        let route = match self.slot {
            Some(slot) => Route::ThroughReceiver { slot },
            None => Route::Direct {
                device_index: DIRECT_DEVICE_INDEX,
            },
        };
        let config = ChannelConfig::default()
            .with_response_timeout(Duration::from_millis(self.timeout))
            .with_retries(self.retries);

        let mut probed = Vec::new();
        for channel in enumerate_hidpp(route, config).await? {
            probed.push(probe_channel(&channel).await?);
            channel.close().await;
        }

        if root.json {
            writeln!(stdout, "{}", json!(probed)).unwrap();
            return Ok(());
        }

        if probed.is_empty() {
            writeln!(stdout, "{}", "No HID++ interfaces were found.".bright_black()).unwrap();
            return Ok(());
        }

        for (interface_i, interface) in probed.into_iter().enumerate() {
            if interface_i != 0 {
                writeln!(stdout).unwrap();
            }

            writeln!(
                stdout,
                "{:#06x}:{:#06x} {} {}",
                interface.vendor_id.bright_black(),
                interface.product_id.bright_black(),
                format!("{:?}", interface.route).bright_blue(),
                match interface.protocol {
                    Some(ProtocolVersion::V10) => "HID++1.0".yellow().to_string(),
                    Some(ProtocolVersion::V20 {
                        protocol_num,
                        target_sw,
                    }) => format!("HID++2.0 ({}, {:#04x})", protocol_num, target_sw)
                        .green()
                        .to_string(),
                    None => "no answer".red().italic().to_string(),
                },
            )
            .unwrap();

            if interface.features.is_empty() {
                continue;
            }
            writeln!(stdout, " │").unwrap();

            let features_len = interface.features.len();
            for (feature_i, feature) in interface.features.into_iter().enumerate() {
                let mut flags = Vec::new();
                if feature.typ.obsolete {
                    flags.push("obsolete");
                }
                if feature.typ.hidden {
                    flags.push("hidden");
                }
                if feature.typ.engineering {
                    flags.push("engineering");
                }

                writeln!(
                    stdout,
                    "{} {}: {} {} v{} {}",
                    if feature_i == features_len - 1 {
                        " ╰─"
                    } else {
                        " ├─"
                    },
                    format!("{:#04x}", feature.index).bright_blue(),
                    format!("{:#06x}", feature.id).bright_black(),
                    feature.name.unwrap_or("unknown"),
                    feature.version,
                    flags.join(", ").bright_black().italic(),
                )
                .unwrap();
            }
        }

        stdout.flush().unwrap();

        Ok(())
    }
}

async fn probe_channel(channel: &Channel) -> Result<ProbedInterface> {
    let timeout = channel.config().response_timeout;
    let protocol = protocol::determine_version(channel, timeout).await?;

    let features = match protocol {
        Some(ProtocolVersion::V20 { .. }) => probe_features(channel).await?,
        _ => Vec::new(),
    };

    Ok(ProbedInterface {
        vendor_id: channel.vendor_id(),
        product_id: channel.product_id(),
        route: channel.route(),
        protocol,
        features,
    })
}

async fn probe_features(channel: &Channel) -> Result<Vec<ProbedFeature>> {
    let root_index = channel.update_feature_mapping(root::FEATURE_ID).await?;
    let mut features = vec![ProbedFeature {
        index: root_index,
        id: root::FEATURE_ID,
        name: registry::name(root::FEATURE_ID),
        version: channel.feature_version(root::FEATURE_ID).await?,
        typ: FeatureType::default(),
    }];

    let table = match feature_set::enumerate(channel).await {
        Ok(table) => table,
        Err(HidppError::UnsupportedFeature { .. }) => {
            debug!("device does not support enumerating its features");
            return Ok(features);
        },
        Err(err) => return Err(err.into()),
    };

    features.extend(table.into_iter().map(|(index, info)| ProbedFeature {
        index,
        id: info.id,
        name: registry::name(info.id),
        version: info.version,
        typ: info.typ,
    }));

    Ok(features)
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
struct ProbedInterface {
    vendor_id: u16,
    product_id: u16,
    route: Route,

    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<ProtocolVersion>,

    features: Vec<ProbedFeature>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
struct ProbedFeature {
    index: u8,
    id: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,

    version: u8,
    typ: FeatureType,
}
