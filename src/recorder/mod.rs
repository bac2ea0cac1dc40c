//! Recording system module
//!
//! This module implements the capture-session lifecycle:
//! - CaptureSession state machine with one-shot finish delivery
//! - SignalBridge mapping interrupt/suspend requests onto the session
//! - SessionRunner sequencing delay, start, auto-stop and finalization

pub mod preset;
pub mod runner;
pub mod session;
pub mod signals;
pub mod state;

pub use preset::EncodingPreset;
pub use runner::{RunReport, RunnerConfig, SessionRunner};
pub use session::CaptureSession;
pub use signals::{ControlSignal, SignalBridge};
pub use state::{FinishOutcome, FinishResult, RecordingConfig, SessionState};
