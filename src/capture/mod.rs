//! Capture devices and the engine that writes movie files
//!
//! This module provides the device catalog, the native camera/microphone
//! registry and the FFmpeg-backed output sink.

pub mod audio;
pub mod catalog;
pub mod ffmpeg;
pub mod native;
pub mod traits;

pub use catalog::DeviceCatalog;
pub use ffmpeg::FfmpegEngine;
pub use native::NativeRegistry;

// Re-export traits
pub use traits::{
    CaptureDevice, CaptureEngine, DeviceRegistry, MediaKind, OutputSink, SinkSpec, SinkSummary,
};
