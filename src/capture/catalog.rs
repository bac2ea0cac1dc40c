//! Video device catalog
//!
//! Resolves capture devices against the registry. Nothing is cached so that
//! devices attached or detached between calls are observed.

use super::traits::{CaptureDevice, DeviceRegistry};
use std::sync::Arc;

/// Queries over the video-capable devices of a registry
#[derive(Clone)]
pub struct DeviceCatalog {
    registry: Arc<dyn DeviceRegistry>,
}

impl DeviceCatalog {
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// The registry backing this catalog
    pub fn registry(&self) -> Arc<dyn DeviceRegistry> {
        self.registry.clone()
    }

    /// Devices advertising video or muxed audio/video, in enumeration order
    pub fn list_video_devices(&self) -> Vec<CaptureDevice> {
        self.registry
            .devices()
            .into_iter()
            .filter(CaptureDevice::has_video)
            .collect()
    }

    /// First video device in enumeration order
    pub fn default_device(&self) -> Option<CaptureDevice> {
        self.list_video_devices().into_iter().next()
    }

    /// Exact, case-sensitive match on the device name
    pub fn device_named(&self, name: &str) -> Option<CaptureDevice> {
        self.list_video_devices()
            .into_iter()
            .find(|device| device.name == name)
    }

    /// Device at `index` in the video device list
    pub fn device_at(&self, index: usize) -> Option<CaptureDevice> {
        self.list_video_devices().into_iter().nth(index)
    }

    /// Resolve a user selector. An exact name wins, otherwise a bare number is
    /// an index. No selector means the default device.
    pub fn resolve(&self, selector: Option<&str>) -> Option<CaptureDevice> {
        match selector {
            None => self.default_device(),
            Some(sel) => match sel.parse::<usize>() {
                Ok(index) => self.device_named(sel).or_else(|| self.device_at(index)),
                Err(_) => self.device_named(sel),
            },
        }
    }

    /// One line per device: name plus capability summary
    pub fn listing(&self) -> String {
        let devices = self.list_video_devices();
        let mut out = format!("Found {} connected video device(s):\n", devices.len());
        for (index, device) in devices.iter().enumerate() {
            out.push_str(&format!(
                "[{}] {} ({})\n",
                index,
                device.name,
                device.capability_summary()
            ));
        }
        out
    }
}
