//! Encoding presets
//!
//! Named quality/format profiles applied to the output sink.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding preset applied to the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingPreset {
    Low,
    Medium,
    #[default]
    High,
    #[serde(rename = "640x480")]
    Vga,
    #[serde(rename = "960x540")]
    Qhd,
    #[serde(rename = "1280x720")]
    Hd720,
    #[serde(rename = "1920x1080")]
    Hd1080,
    #[serde(rename = "3840x2160")]
    Uhd,
}

impl EncodingPreset {
    pub const ALL: [EncodingPreset; 8] = [
        EncodingPreset::Low,
        EncodingPreset::Medium,
        EncodingPreset::High,
        EncodingPreset::Vga,
        EncodingPreset::Qhd,
        EncodingPreset::Hd720,
        EncodingPreset::Hd1080,
        EncodingPreset::Uhd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EncodingPreset::Low => "Low",
            EncodingPreset::Medium => "Medium",
            EncodingPreset::High => "High",
            EncodingPreset::Vga => "640x480",
            EncodingPreset::Qhd => "960x540",
            EncodingPreset::Hd720 => "1280x720",
            EncodingPreset::Hd1080 => "1920x1080",
            EncodingPreset::Uhd => "3840x2160",
        }
    }

    /// CRF value for H.264 encoding
    /// Lower values = higher quality, larger files
    pub fn crf(&self) -> u8 {
        match self {
            EncodingPreset::Low => 28,
            EncodingPreset::Medium => 23,
            _ => 18,
        }
    }

    /// x264 speed preset. Capture is realtime, so nothing slower than `fast`.
    pub fn h264_preset(&self) -> &'static str {
        match self {
            EncodingPreset::Low => "ultrafast",
            EncodingPreset::Medium => "veryfast",
            EncodingPreset::Uhd => "ultrafast",
            _ => "fast",
        }
    }

    /// Fixed output resolution, if the preset pins one
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match self {
            EncodingPreset::Vga => Some((640, 480)),
            EncodingPreset::Qhd => Some((960, 540)),
            EncodingPreset::Hd720 => Some((1280, 720)),
            EncodingPreset::Hd1080 => Some((1920, 1080)),
            EncodingPreset::Uhd => Some((3840, 2160)),
            _ => None,
        }
    }
}

impl fmt::Display for EncodingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncodingPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{}', expected one of: {}", s, names.join(", "))
            })
    }
}
