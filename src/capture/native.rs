//! Native device registry
//!
//! Cameras come from nokhwa, audio inputs from cpal. A camera whose name
//! matches an audio input is reported as a muxed audio/video device.

use super::traits::{CaptureDevice, DeviceRegistry, MediaKind};
use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::utils::{ApiBackend, CameraIndex};

/// Registry backed by the host's camera and audio APIs
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRegistry;

impl NativeRegistry {
    pub fn new() -> Self {
        Self
    }

    fn audio_input_names() -> Vec<String> {
        match cpal::default_host().input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate audio inputs: {}", e);
                Vec::new()
            }
        }
    }

    fn cameras(audio_names: &[String]) -> Vec<CaptureDevice> {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(cameras) => cameras
                .into_iter()
                .map(|info| {
                    let id = match info.index() {
                        CameraIndex::Index(i) => i.to_string(),
                        CameraIndex::String(s) => s.to_string(),
                    };
                    let name = info.human_name().to_string();
                    let media = if audio_names.contains(&name) {
                        MediaKind::Muxed
                    } else {
                        MediaKind::Video
                    };
                    CaptureDevice::new(id, name, media)
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }
}

impl DeviceRegistry for NativeRegistry {
    fn devices(&self) -> Vec<CaptureDevice> {
        let audio_names = Self::audio_input_names();
        let mut devices = Self::cameras(&audio_names);

        let audio_only: Vec<CaptureDevice> = audio_names
            .into_iter()
            .filter(|name| !devices.iter().any(|d| &d.name == name))
            .map(|name| CaptureDevice::new(name.clone(), name, MediaKind::Audio))
            .collect();
        devices.extend(audio_only);

        tracing::debug!("Enumerated {} capture devices", devices.len());
        devices
    }

    fn default_audio_device(&self) -> Option<CaptureDevice> {
        let name = cpal::default_host().default_input_device()?.name().ok()?;
        Some(CaptureDevice::new(name.clone(), name, MediaKind::Audio))
    }
}

/// Find the cpal input device with this name
pub(crate) fn find_audio_input(name: &str) -> Option<cpal::Device> {
    let host = cpal::default_host();
    let found = host
        .input_devices()
        .ok()?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false));
    found.or_else(|| {
        host.default_input_device()
            .filter(|d| d.name().map(|n| n == name).unwrap_or(false))
    })
}

/// Map a device id back to a nokhwa camera index
pub(crate) fn camera_index(device: &CaptureDevice) -> CameraIndex {
    match device.id.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device.id.clone()),
    }
}
