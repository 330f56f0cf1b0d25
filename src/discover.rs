use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;

/// One NDI source as reported by the GStreamer device monitor.
#[derive(Debug, Clone)]
pub struct NdiSource {
    pub display_name: String,
    pub device_class: String,
    pub ndi_name: Option<String>,
    pub url_address: Option<String>,
}

/// Scan the network for NDI sources for `scan_duration`, via
/// `GstDeviceMonitor` filtered to `Source/Network` devices advertising
/// `application/x-ndi`.
pub fn discover_ndi_sources(scan_duration: Duration) -> anyhow::Result<Vec<NdiSource>> {
    gst::init()?;

    let monitor = gst::DeviceMonitor::new();
    let caps = gst::Caps::new_empty_simple("application/x-ndi");
    monitor
        .add_filter(Some("Source/Network"), Some(&caps))
        .ok_or_else(|| anyhow::anyhow!("failed to add NDI device monitor filter"))?;

    monitor
        .start()
        .map_err(|_| anyhow::anyhow!("failed to start device monitor; NDI plugin may be missing"))?;

    std::thread::sleep(scan_duration);

    let devices = monitor.devices();
    monitor.stop();

    Ok(devices.into_iter().map(describe_device).collect())
}

fn describe_device(device: gst::Device) -> NdiSource {
    let display_name = device.display_name().to_string();
    let device_class = device.device_class().to_string();

    let (ndi_name, url_address) = match device.properties() {
        Some(props) => (
            props.get::<String>("ndi-name").ok(),
            props.get::<String>("url-address").ok(),
        ),
        None => (None, None),
    };

    NdiSource {
        display_name,
        device_class,
        ndi_name,
        url_address,
    }
}
