//! Session runner
//!
//! Drives one recording end to end: resolve the device, configure the session,
//! wait out the start delay, record until the duration elapses or a stop
//! signal arrives, then wait for the finish result.

use super::preset::EncodingPreset;
use super::session::CaptureSession;
use super::signals::{ControlSignal, Dispatched, SignalBridge};
use super::state::{FinishOutcome, FinishResult, RecordingConfig};
use crate::capture::{CaptureEngine, DeviceCatalog};
use crate::utils::{ExitStatus, RunError, SessionError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Default upper bound on how long finalization may take
pub const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the runner needs for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Device name or index; `None` picks the default device
    pub device: Option<String>,
    pub output_path: PathBuf,
    pub duration: Option<Duration>,
    pub delay: Duration,
    pub preset: EncodingPreset,
    pub audio: bool,
    pub finalize_timeout: Duration,
}

impl RunnerConfig {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            device: None,
            output_path: output_path.into(),
            duration: None,
            delay: Duration::ZERO,
            preset: EncodingPreset::default(),
            audio: true,
            finalize_timeout: DEFAULT_FINALIZE_TIMEOUT,
        }
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub result: FinishResult,
    pub exit: ExitStatus,
}

impl RunReport {
    fn from_result(result: FinishResult) -> Self {
        let exit = match result.outcome {
            FinishOutcome::Success => ExitStatus::Success,
            FinishOutcome::Failed => ExitStatus::FinalizeFailed,
            FinishOutcome::NotStarted => ExitStatus::NotStarted,
        };
        Self { result, exit }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit.code()
    }
}

/// Sequences delay -> start -> wait -> stop for a single recording
pub struct SessionRunner {
    catalog: DeviceCatalog,
    engine: Arc<dyn CaptureEngine>,
    config: RunnerConfig,
}

impl SessionRunner {
    pub fn new(catalog: DeviceCatalog, engine: Arc<dyn CaptureEngine>, config: RunnerConfig) -> Self {
        Self {
            catalog,
            engine,
            config,
        }
    }

    /// Run the recording, consuming control signals from `signals`
    pub async fn run(
        &self,
        mut signals: mpsc::UnboundedReceiver<ControlSignal>,
    ) -> Result<RunReport, RunError> {
        let device = self
            .catalog
            .resolve(self.config.device.as_deref())
            .ok_or_else(|| match &self.config.device {
                Some(selector) => RunError::DeviceNotFound(selector.clone()),
                None => RunError::NoDevices,
            })?;

        tracing::info!("Using device '{}' ({})", device.name, device.capability_summary());

        let session = CaptureSession::new(self.catalog.registry(), self.engine.clone());
        let recording = RecordingConfig {
            device,
            output_path: self.config.output_path.clone(),
            duration: self.config.duration,
            preset: self.config.preset,
            delay: self.config.delay,
            audio: self.config.audio,
        };
        // Opening the sink probes FFmpeg and the devices
        let configuring = session.clone();
        tokio::task::spawn_blocking(move || configuring.configure(recording)).await??;

        let (finish_tx, mut finish_rx) = oneshot::channel();
        session.on_finish(move |result| {
            let _ = finish_tx.send(result);
        })?;

        let mut bridge = SignalBridge::new();

        if !self.config.delay.is_zero() {
            session.begin_delay()?;
            tracing::info!("Delaying {:.2}s before recording", self.config.delay.as_secs_f64());
            let delay = tokio::time::sleep(self.config.delay);
            tokio::pin!(delay);
            while !bridge.stop_requested() {
                tokio::select! {
                    _ = &mut delay => break,
                    Some(signal) = signals.recv() => {
                        bridge.dispatch(signal, &session);
                    }
                }
            }
        }

        if !bridge.stop_requested() {
            // Blocks until the camera delivers frames
            let starting = session.clone();
            match tokio::task::spawn_blocking(move || starting.start()).await? {
                Ok(()) => {}
                // The failure is also delivered through the finish handler
                Err(SessionError::SinkFailed(e)) => tracing::warn!("Recording failed to start: {}", e),
                Err(e) => return Err(e.into()),
            }
        }

        let auto_stop = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(auto_stop);
        let mut auto_stopped = false;

        let finalize_timeout = self.config.finalize_timeout;
        let finalize_deadline = tokio::time::sleep(finalize_timeout);
        tokio::pin!(finalize_deadline);
        let mut finalizing = bridge.stop_requested();
        if finalizing {
            finalize_deadline.as_mut().reset(Instant::now() + finalize_timeout);
        }

        let result = loop {
            tokio::select! {
                biased;

                result = &mut finish_rx => {
                    break result.unwrap_or_else(|_| {
                        FinishResult::failed(
                            self.config.output_path.clone(),
                            "finish handler dropped without a result",
                            session.recorded_duration(),
                            session.segment_count(),
                        )
                    });
                }
                _ = &mut finalize_deadline, if finalizing => {
                    tracing::error!("Finalization did not complete within {:?}", finalize_timeout);
                    let result = FinishResult::failed(
                        self.config.output_path.clone(),
                        "finalization timed out",
                        session.recorded_duration(),
                        session.segment_count(),
                    );
                    return Ok(RunReport {
                        result,
                        exit: ExitStatus::FinalizeTimeout,
                    });
                }
                _ = &mut auto_stop, if !auto_stopped => {
                    auto_stopped = true;
                    tracing::info!("Recording duration reached");
                    session.stop();
                    if !finalizing {
                        finalizing = true;
                        finalize_deadline.as_mut().reset(Instant::now() + finalize_timeout);
                    }
                }
                Some(signal) = signals.recv() => {
                    if bridge.dispatch(signal, &session) == Dispatched::Stopped && !finalizing {
                        finalizing = true;
                        finalize_deadline.as_mut().reset(Instant::now() + finalize_timeout);
                    }
                }
            }
        };

        tracing::info!("Session finished: {:?}", result.outcome);
        Ok(RunReport::from_result(result))
    }
}
