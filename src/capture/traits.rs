//! Capture trait definitions
//!
//! Platform-agnostic types and traits for the external capture framework:
//! the device registry, the capture engine and the file-output sink it opens.

use crate::recorder::preset::EncodingPreset;
use crate::utils::SinkError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Media carried by a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video only
    Video,
    /// Audio only
    Audio,
    /// Combined audio and video
    Muxed,
}

/// A capture endpoint reported by the device registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDevice {
    /// Backend-specific identifier (index or unique id)
    pub id: String,

    /// Human-readable device name, unique among attached devices
    pub name: String,

    /// Media the device produces
    pub media: MediaKind,
}

impl CaptureDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, media: MediaKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            media,
        }
    }

    pub fn has_video(&self) -> bool {
        matches!(self.media, MediaKind::Video | MediaKind::Muxed)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self.media, MediaKind::Audio | MediaKind::Muxed)
    }

    /// Short capability summary used by the device listing
    pub fn capability_summary(&self) -> &'static str {
        match self.media {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Muxed => "audio+video",
        }
    }
}

/// Read-only view of the devices currently attached to the host
pub trait DeviceRegistry: Send + Sync {
    /// Every attached device, in enumeration order
    fn devices(&self) -> Vec<CaptureDevice>;

    /// The system default audio input, if any
    fn default_audio_device(&self) -> Option<CaptureDevice>;
}

/// Everything a sink needs to write one movie file
#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub video: CaptureDevice,
    pub audio: Option<CaptureDevice>,
    pub output_path: PathBuf,
    pub preset: EncodingPreset,
}

/// What a sink reports once the file has been closed
#[derive(Debug, Clone, Default)]
pub struct SinkSummary {
    /// Video frames written to the file
    pub frames_written: u64,

    /// Time the sink spent capturing, as seen by the sink
    pub captured: Duration,
}

/// Destination that receives captured media and writes the movie file
pub trait OutputSink: Send {
    /// Begin writing to the output file
    fn start(&mut self) -> Result<(), SinkError>;

    /// Stop accepting media without closing the file
    fn pause(&mut self);

    /// Accept media again after a pause
    fn resume(&mut self);

    /// Flush buffered media and close the file. Blocks until done.
    fn finish(self: Box<Self>) -> Result<SinkSummary, SinkError>;
}

/// The media framework that can open output sinks for a device
pub trait CaptureEngine: Send + Sync {
    fn open_sink(&self, spec: &SinkSpec) -> Result<Box<dyn OutputSink>, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_by_media_kind() {
        let cam = CaptureDevice::new("0", "Cam1", MediaKind::Video);
        let mic = CaptureDevice::new("mic", "Built-in Mic", MediaKind::Audio);
        let dv = CaptureDevice::new("1", "DV Camera", MediaKind::Muxed);

        assert!(cam.has_video() && !cam.has_audio());
        assert!(!mic.has_video() && mic.has_audio());
        assert!(dv.has_video() && dv.has_audio());
        assert_eq!(dv.capability_summary(), "audio+video");
    }
}
