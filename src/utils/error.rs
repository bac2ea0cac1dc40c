//! Error types and handling
//!
//! Error taxonomy for configuration, session transitions, the output sink and
//! the runner, plus the process exit code each one maps to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while configuring a capture session
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Device '{0}' does not support video capture")]
    DeviceUnsupported(String),

    #[error("Audio was requested but no audio source is available for '{0}'")]
    NoAudioAvailable(String),

    #[error("Session has already started, configuration is locked")]
    AlreadyStarted,

    #[error("Output sink unavailable: {0}")]
    Sink(#[from] SinkError),
}

/// Errors raised by invalid session transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session is already recording or not in a startable state")]
    AlreadyRecording,

    #[error("Session is not recording")]
    NotRecording,

    #[error("Session is not configured")]
    NotConfigured,

    #[error("A finish handler must be registered before starting")]
    NoFinishHandler,

    #[error("Session has already finished")]
    Finished,

    #[error("Output sink failed to start: {0}")]
    SinkFailed(String),
}

/// Errors raised by the file-output sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Device error: {0}")]
    Device(String),
}

/// Errors that abort a run before a finish result exists
#[derive(Error, Debug)]
pub enum RunError {
    #[error("No video device found matching '{0}'")]
    DeviceNotFound(String),

    #[error("No video devices attached")]
    NoDevices,

    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Device worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl RunError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::DeviceNotFound(_) | RunError::NoDevices => ExitStatus::DeviceNotFound.code(),
            RunError::Config(_) | RunError::Session(_) | RunError::Worker(_) => {
                ExitStatus::ConfigFailed.code()
            }
        }
    }
}

/// Exit status of a camsnap invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    FinalizeFailed,
    ConfigFailed,
    DeviceNotFound,
    NotStarted,
    FinalizeTimeout,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::FinalizeFailed => 1,
            ExitStatus::ConfigFailed => 2,
            ExitStatus::DeviceNotFound => 3,
            ExitStatus::NotStarted => 4,
            ExitStatus::FinalizeTimeout => 5,
        }
    }
}

/// Result type alias for session transitions
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_errors_map_to_device_not_found() {
        assert_eq!(RunError::DeviceNotFound("NoSuchCam".into()).exit_code(), 3);
        assert_eq!(RunError::NoDevices.exit_code(), 3);
    }

    #[test]
    fn test_config_errors_map_to_config_failed() {
        let err = RunError::from(ConfigError::NoAudioAvailable("Cam1".into()));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(RunError::from(SessionError::NoFinishHandler).exit_code(), 2);
    }

    #[test]
    fn test_sink_error_wraps_into_config_error() {
        let err: ConfigError = SinkError::Encoder("ffmpeg not found".into()).into();
        assert!(err.to_string().contains("ffmpeg not found"));
    }
}
