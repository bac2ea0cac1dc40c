//! Recording state management
//!
//! Defines the capture session state machine, the recording configuration and
//! the result delivered when a session finishes.

use super::preset::EncodingPreset;
use crate::capture::CaptureDevice;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Configured or not, nothing started
    #[default]
    Idle,
    /// Waiting out the start delay
    Delaying,
    /// Currently recording
    Recording,
    /// Recording is paused, device still held
    Paused,
    /// Stop requested, sink is flushing
    Finalizing,
    /// File closed successfully
    Completed,
    /// File closed with an error
    Failed,
}

impl SessionState {
    pub fn is_startable(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Delaying)
    }

    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }
}

/// One uninterrupted stretch of recording
///
/// A new segment is opened each time recording is resumed.
#[derive(Debug, Clone)]
pub struct RecordedSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    started: Instant,

    ended: Option<Instant>,
}

impl RecordedSegment {
    /// Open a new segment starting now
    pub fn new(index: usize) -> Self {
        Self {
            index,
            started: Instant::now(),
            ended: None,
        }
    }

    /// Close the segment; closing twice keeps the first end time
    pub fn end(&mut self) {
        if self.ended.is_none() {
            self.ended = Some(Instant::now());
        }
    }

    /// Length of the segment, up to now if it is still open
    pub fn duration(&self) -> Duration {
        match self.ended {
            Some(end) => end.duration_since(self.started),
            None => self.started.elapsed(),
        }
    }
}

/// Configuration for one recording. Immutable once the session starts.
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Video device to capture
    pub device: CaptureDevice,

    /// Output movie file
    pub output_path: PathBuf,

    /// Auto-stop after this long; `None` records until interrupted
    pub duration: Option<Duration>,

    /// Encoding preset for the sink
    pub preset: EncodingPreset,

    /// Wait this long before starting
    pub delay: Duration,

    /// Whether to attach an audio input
    pub audio: bool,
}

impl RecordingConfig {
    pub fn new(device: CaptureDevice, output_path: impl Into<PathBuf>) -> Self {
        Self {
            device,
            output_path: output_path.into(),
            duration: None,
            preset: EncodingPreset::default(),
            delay: Duration::ZERO,
            audio: true,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishOutcome {
    Success,
    Failed,
    /// Stopped before recording began
    NotStarted,
}

/// Result of a finished session, delivered exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResult {
    pub outcome: FinishOutcome,

    /// Error description when the outcome is `Failed`
    pub error: Option<String>,

    /// Path of the movie file
    pub output_path: PathBuf,

    /// Time spent recording, paused time excluded
    #[serde(with = "duration_secs")]
    pub recorded: Duration,

    /// Number of recorded segments (pause/resume cycles + 1)
    pub segments: usize,
}

impl FinishResult {
    pub fn success(output_path: PathBuf, recorded: Duration, segments: usize) -> Self {
        Self {
            outcome: FinishOutcome::Success,
            error: None,
            output_path,
            recorded,
            segments,
        }
    }

    pub fn failed(output_path: PathBuf, error: impl Into<String>, recorded: Duration, segments: usize) -> Self {
        Self {
            outcome: FinishOutcome::Failed,
            error: Some(error.into()),
            output_path,
            recorded,
            segments,
        }
    }

    pub fn not_started(output_path: PathBuf) -> Self {
        Self {
            outcome: FinishOutcome::NotStarted,
            error: None,
            output_path,
            recorded: Duration::ZERO,
            segments: 0,
        }
    }

    /// Human-readable one-line summary for the console
    pub fn summary(&self) -> String {
        match self.outcome {
            FinishOutcome::Success => format!(
                "Recorded {:.2}s of video to {}",
                self.recorded.as_secs_f64(),
                self.output_path.display()
            ),
            FinishOutcome::Failed => format!(
                "Recording to {} failed after {:.2}s: {}",
                self.output_path.display(),
                self.recorded.as_secs_f64(),
                self.error.as_deref().unwrap_or("unknown error")
            ),
            FinishOutcome::NotStarted => format!(
                "Recording cancelled before it started, {} was not written",
                self.output_path.display()
            ),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
