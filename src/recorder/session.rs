//! Capture session
//!
//! Owns the recording state machine for one movie file. All transitions go
//! through a single lock, so a duration timeout and a signal-driven stop can
//! race safely: whichever arrives first wins and the other is a no-op.

use super::state::{FinishResult, RecordedSegment, RecordingConfig, SessionState};
use crate::capture::{CaptureDevice, CaptureEngine, DeviceRegistry, OutputSink, SinkSpec};
use crate::utils::{ConfigError, SessionError, SessionResult, SinkError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// One-shot completion handler
pub type FinishHandler = Box<dyn FnOnce(FinishResult) + Send + 'static>;

#[derive(Default)]
struct Inner {
    state: SessionState,
    config: Option<RecordingConfig>,
    audio_device: Option<CaptureDevice>,
    sink: Option<Box<dyn OutputSink>>,
    segments: Vec<RecordedSegment>,
    on_finish: Option<FinishHandler>,
    /// Set once the finish result has been (or is being) produced
    finished: bool,
}

impl Inner {
    fn recorded(&self) -> Duration {
        self.segments.iter().map(RecordedSegment::duration).sum()
    }

    fn output_path(&self) -> PathBuf {
        self.config
            .as_ref()
            .map(|c| c.output_path.clone())
            .unwrap_or_default()
    }

    fn close_segment(&mut self) {
        if let Some(segment) = self.segments.last_mut() {
            segment.end();
        }
    }
}

/// A single recording request driven against the capture engine
///
/// Clones share the same session.
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<Mutex<Inner>>,
    registry: Arc<dyn DeviceRegistry>,
    engine: Arc<dyn CaptureEngine>,
}

impl CaptureSession {
    pub fn new(registry: Arc<dyn DeviceRegistry>, engine: Arc<dyn CaptureEngine>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            registry,
            engine,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// True while the device is held: recording or paused
    pub fn is_recording(&self) -> bool {
        self.inner.lock().state.is_active()
    }

    /// Audio input attached by `configure`, if any
    pub fn audio_device(&self) -> Option<CaptureDevice> {
        self.inner.lock().audio_device.clone()
    }

    /// Recorded time so far, paused time excluded
    pub fn recorded_duration(&self) -> Duration {
        self.inner.lock().recorded()
    }

    /// Number of recorded segments so far
    pub fn segment_count(&self) -> usize {
        self.inner.lock().segments.len()
    }

    /// Validate the configuration, resolve audio and attach the output sink
    pub fn configure(&self, config: RecordingConfig) -> Result<(), ConfigError> {
        if !self.inner.lock().state.is_startable() {
            return Err(ConfigError::AlreadyStarted);
        }

        if !config.device.has_video() {
            return Err(ConfigError::DeviceUnsupported(config.device.name.clone()));
        }

        let audio_device = if config.audio {
            Some(self.resolve_audio(&config.device)?)
        } else {
            None
        };

        let spec = SinkSpec {
            video: config.device.clone(),
            audio: audio_device.clone(),
            output_path: config.output_path.clone(),
            preset: config.preset,
        };
        let sink = self.engine.open_sink(&spec)?;

        tracing::info!(
            "Configured session: device={}, audio={}, output={}, preset={}",
            config.device.name,
            audio_device.as_ref().map(|d| d.name.as_str()).unwrap_or("none"),
            config.output_path.display(),
            config.preset
        );

        let mut inner = self.inner.lock();
        if !inner.state.is_startable() {
            return Err(ConfigError::AlreadyStarted);
        }
        inner.config = Some(config);
        inner.audio_device = audio_device;
        inner.sink = Some(sink);
        Ok(())
    }

    /// Audio from the video device itself when muxed, else the system default input
    fn resolve_audio(&self, video: &CaptureDevice) -> Result<CaptureDevice, ConfigError> {
        if video.has_audio() {
            return Ok(video.clone());
        }
        self.registry
            .default_audio_device()
            .filter(CaptureDevice::has_audio)
            .ok_or_else(|| ConfigError::NoAudioAvailable(video.name.clone()))
    }

    /// Register the one-shot completion handler. Must happen before `start`.
    pub fn on_finish<F>(&self, handler: F) -> SessionResult<()>
    where
        F: FnOnce(FinishResult) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.finished {
            return Err(SessionError::Finished);
        }
        if !inner.state.is_startable() {
            return Err(SessionError::AlreadyRecording);
        }
        inner.on_finish = Some(Box::new(handler));
        Ok(())
    }

    /// Idle -> Delaying
    pub fn begin_delay(&self) -> SessionResult<()> {
        let mut inner = self.inner.lock();
        if inner.finished {
            return Err(SessionError::Finished);
        }
        match inner.state {
            SessionState::Idle => {
                inner.state = SessionState::Delaying;
                Ok(())
            }
            SessionState::Delaying => Ok(()),
            _ => Err(SessionError::AlreadyRecording),
        }
    }

    /// Idle/Delaying -> Recording
    ///
    /// If the sink refuses to start, the session fails and the finish handler
    /// receives the error as well.
    pub fn start(&self) -> SessionResult<()> {
        let mut inner = self.inner.lock();
        if inner.finished {
            return Err(SessionError::Finished);
        }
        if !inner.state.is_startable() {
            return Err(SessionError::AlreadyRecording);
        }
        if inner.on_finish.is_none() {
            return Err(SessionError::NoFinishHandler);
        }
        let Some(sink) = inner.sink.as_mut() else {
            return Err(SessionError::NotConfigured);
        };

        if let Err(e) = sink.start() {
            tracing::error!("Output sink failed to start: {}", e);
            let message = e.to_string();
            inner.state = SessionState::Failed;
            inner.finished = true;
            inner.sink = None;
            let handler = inner.on_finish.take();
            let result = FinishResult::failed(inner.output_path(), message.clone(), Duration::ZERO, 0);
            drop(inner);
            if let Some(handler) = handler {
                handler(result);
            }
            return Err(SessionError::SinkFailed(message));
        }

        inner.segments.clear();
        inner.segments.push(RecordedSegment::new(0));
        inner.state = SessionState::Recording;
        tracing::info!("Recording started: {}", inner.output_path().display());
        Ok(())
    }

    /// Recording -> Paused
    pub fn pause(&self) -> SessionResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Recording {
            tracing::warn!("Pause ignored, session is {:?}", inner.state);
            return Err(SessionError::NotRecording);
        }
        inner.close_segment();
        if let Some(sink) = inner.sink.as_mut() {
            sink.pause();
        }
        inner.state = SessionState::Paused;
        tracing::info!("Recording paused");
        Ok(())
    }

    /// Paused -> Recording
    pub fn resume(&self) -> SessionResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Paused {
            tracing::warn!("Resume ignored, session is {:?}", inner.state);
            return Err(SessionError::NotRecording);
        }
        let index = inner.segments.len();
        inner.segments.push(RecordedSegment::new(index));
        if let Some(sink) = inner.sink.as_mut() {
            sink.resume();
        }
        inner.state = SessionState::Recording;
        tracing::info!("Recording resumed (segment {})", index);
        Ok(())
    }

    /// Pause when recording, resume when paused
    pub fn toggle_pause(&self) -> SessionResult<()> {
        let state = self.state();
        match state {
            SessionState::Recording => self.pause(),
            SessionState::Paused => self.resume(),
            other => {
                tracing::warn!("Pause toggle ignored, session is {:?}", other);
                Err(SessionError::NotRecording)
            }
        }
    }

    /// Request finalization.
    ///
    /// Recording/Paused -> Finalizing, then Completed or Failed once the sink
    /// has closed the file; the finish handler runs on the finalizer thread.
    /// Before recording begins this delivers a "not started" result instead.
    /// Repeated calls are no-ops.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            SessionState::Idle | SessionState::Delaying => {
                if inner.finished {
                    return;
                }
                inner.finished = true;
                inner.sink = None;
                let handler = inner.on_finish.take();
                let result = FinishResult::not_started(inner.output_path());
                tracing::info!("Stop requested before recording started");
                drop(inner);
                if let Some(handler) = handler {
                    handler(result);
                }
                return;
            }
            SessionState::Recording | SessionState::Paused => {}
            other => {
                tracing::debug!("Stop ignored, session is {:?}", other);
                return;
            }
        }

        inner.close_segment();
        inner.state = SessionState::Finalizing;
        inner.finished = true;
        let sink = inner.sink.take();
        drop(inner);

        tracing::info!("Stopping recording, finalizing output");

        let finalize = {
            let shared = self.inner.clone();
            move || Self::finalize(shared, sink)
        };
        let spawned = std::thread::Builder::new()
            .name("camsnap-finalize".to_string())
            .spawn(finalize);
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn finalizer thread: {}", e);
            let mut inner = self.inner.lock();
            inner.state = SessionState::Failed;
            let handler = inner.on_finish.take();
            let result = FinishResult::failed(
                inner.output_path(),
                format!("could not finalize output: {}", e),
                inner.recorded(),
                inner.segments.len(),
            );
            drop(inner);
            if let Some(handler) = handler {
                handler(result);
            }
        }
    }

    fn finalize(shared: Arc<Mutex<Inner>>, sink: Option<Box<dyn OutputSink>>) {
        let outcome: Result<_, SinkError> = match sink {
            Some(sink) => sink.finish(),
            None => Err(SinkError::Encoder("no output sink attached".to_string())),
        };

        let mut inner = shared.lock();
        let recorded = inner.recorded();
        let segments = inner.segments.len();
        let path = inner.output_path();
        let result = match outcome {
            Ok(summary) => {
                tracing::info!(
                    "Output finalized: {} frames, {:.2}s recorded ({:.2}s captured by sink)",
                    summary.frames_written,
                    recorded.as_secs_f64(),
                    summary.captured.as_secs_f64()
                );
                inner.state = SessionState::Completed;
                FinishResult::success(path, recorded, segments)
            }
            Err(e) => {
                tracing::error!("Output finalization failed: {}", e);
                inner.state = SessionState::Failed;
                FinishResult::failed(path, e.to_string(), recorded, segments)
            }
        };
        let handler = inner.on_finish.take();
        drop(inner);

        if let Some(handler) = handler {
            handler(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MediaKind;
    use crate::recorder::state::FinishOutcome;
    use crate::testing::{FakeEngine, FakeRegistry, SinkCall};
    use std::sync::mpsc;

    fn cam(media: MediaKind) -> CaptureDevice {
        CaptureDevice::new("0", "Cam1", media)
    }

    fn session_with(registry: FakeRegistry, engine: Arc<FakeEngine>) -> CaptureSession {
        CaptureSession::new(Arc::new(registry), engine)
    }

    fn configured(engine: Arc<FakeEngine>) -> (CaptureSession, mpsc::Receiver<FinishResult>) {
        let session = session_with(FakeRegistry::new(vec![cam(MediaKind::Video)]), engine);
        let mut config = RecordingConfig::new(cam(MediaKind::Video), "out.mov");
        config.audio = false;
        session.configure(config).unwrap();
        let (tx, rx) = mpsc::channel();
        session
            .on_finish(move |result| {
                let _ = tx.send(result);
            })
            .unwrap();
        (session, rx)
    }

    #[test]
    fn test_configure_rejects_audio_only_device() {
        let session = session_with(FakeRegistry::new(vec![]), Arc::new(FakeEngine::default()));
        let config = RecordingConfig::new(CaptureDevice::new("m", "Mic", MediaKind::Audio), "out.mov");
        assert!(matches!(session.configure(config), Err(ConfigError::DeviceUnsupported(_))));
    }

    #[test]
    fn test_configure_without_audio_source_fails_loud() {
        let engine = Arc::new(FakeEngine::default());
        let session = session_with(FakeRegistry::new(vec![cam(MediaKind::Video)]), engine.clone());
        let config = RecordingConfig::new(cam(MediaKind::Video), "out.mov");

        assert!(matches!(session.configure(config), Err(ConfigError::NoAudioAvailable(_))));
        assert_eq!(engine.sinks_opened(), 0);
        assert_eq!(session.start(), Err(SessionError::NoFinishHandler));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_configure_uses_muxed_device_audio() {
        let session = session_with(FakeRegistry::new(vec![]), Arc::new(FakeEngine::default()));
        let config = RecordingConfig::new(cam(MediaKind::Muxed), "out.mov");
        session.configure(config).unwrap();
        assert_eq!(session.audio_device().map(|d| d.name), Some("Cam1".into()));
    }

    #[test]
    fn test_configure_falls_back_to_default_audio() {
        let registry = FakeRegistry::new(vec![cam(MediaKind::Video)])
            .with_default_audio(CaptureDevice::new("mic", "Built-in Mic", MediaKind::Audio));
        let session = session_with(registry, Arc::new(FakeEngine::default()));
        session
            .configure(RecordingConfig::new(cam(MediaKind::Video), "out.mov"))
            .unwrap();
        assert_eq!(session.audio_device().map(|d| d.name), Some("Built-in Mic".into()));
    }

    #[test]
    fn test_configure_surfaces_sink_errors() {
        let engine = Arc::new(FakeEngine::default().refuse_open("ffmpeg not found"));
        let session = session_with(FakeRegistry::new(vec![]), engine);
        let mut config = RecordingConfig::new(cam(MediaKind::Video), "out.mov");
        config.audio = false;
        assert!(matches!(session.configure(config), Err(ConfigError::Sink(_))));
    }

    #[test]
    fn test_start_requires_configuration() {
        let session = session_with(FakeRegistry::new(vec![]), Arc::new(FakeEngine::default()));
        session.on_finish(|_| {}).unwrap();
        assert_eq!(session.start(), Err(SessionError::NotConfigured));
    }

    #[test]
    fn test_second_start_is_rejected_and_state_unchanged() {
        let engine = Arc::new(FakeEngine::default());
        let (session, _rx) = configured(engine.clone());

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        assert_eq!(session.start(), Err(SessionError::AlreadyRecording));
        assert_eq!(session.state(), SessionState::Recording);
        assert_eq!(engine.calls(), vec![SinkCall::Start]);
    }

    #[test]
    fn test_start_after_delay() {
        let (session, _rx) = configured(Arc::new(FakeEngine::default()));
        session.begin_delay().unwrap();
        assert_eq!(session.state(), SessionState::Delaying);
        session.start().unwrap();
        assert!(session.is_recording());
    }

    #[test]
    fn test_cannot_start_from_paused() {
        let (session, _rx) = configured(Arc::new(FakeEngine::default()));
        session.start().unwrap();
        session.pause().unwrap();
        assert_eq!(session.start(), Err(SessionError::AlreadyRecording));
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn test_pause_resume_keeps_recording_flag() {
        let engine = Arc::new(FakeEngine::default());
        let (session, _rx) = configured(engine.clone());
        session.start().unwrap();

        session.pause().unwrap();
        assert!(session.is_recording());
        assert_eq!(session.state(), SessionState::Paused);

        session.resume().unwrap();
        assert!(session.is_recording());
        assert_eq!(session.state(), SessionState::Recording);
        assert_eq!(engine.calls(), vec![SinkCall::Start, SinkCall::Pause, SinkCall::Resume]);
    }

    #[test]
    fn test_pause_outside_recording_is_noop() {
        let engine = Arc::new(FakeEngine::default());
        let (session, _rx) = configured(engine.clone());
        assert_eq!(session.pause(), Err(SessionError::NotRecording));
        assert_eq!(session.resume(), Err(SessionError::NotRecording));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_toggle_pause_alternates() {
        let (session, _rx) = configured(Arc::new(FakeEngine::default()));
        session.start().unwrap();
        session.toggle_pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        session.toggle_pause().unwrap();
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[test]
    fn test_stop_delivers_single_success() {
        let engine = Arc::new(FakeEngine::default());
        let (session, rx) = configured(engine.clone());
        session.start().unwrap();
        session.stop();
        session.stop();

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.outcome, FinishOutcome::Success);
        assert_eq!(result.output_path, PathBuf::from("out.mov"));
        assert_eq!(session.state(), SessionState::Completed);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(engine.calls(), vec![SinkCall::Start, SinkCall::Finish]);
    }

    #[test]
    fn test_concurrent_stops_deliver_exactly_one_result() {
        let engine = Arc::new(FakeEngine::default().finish_after(Duration::from_millis(50)));
        let (session, rx) = configured(engine);
        let session = Arc::new(session);
        session.start().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || session.stop())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_sink_failure_becomes_failed_result() {
        let engine = Arc::new(FakeEngine::default().fail_finish("disk full"));
        let (session, rx) = configured(engine);
        session.start().unwrap();
        session.stop();

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.outcome, FinishOutcome::Failed);
        assert!(result.error.unwrap().contains("disk full"));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_sink_start_failure_fails_session() {
        let engine = Arc::new(FakeEngine::default().fail_start("camera busy"));
        let (session, rx) = configured(engine);

        assert!(matches!(session.start(), Err(SessionError::SinkFailed(_))));
        assert_eq!(session.state(), SessionState::Failed);
        let result = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(result.outcome, FinishOutcome::Failed);
        session.stop();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_stop_while_delaying_never_starts() {
        let engine = Arc::new(FakeEngine::default());
        let (session, rx) = configured(engine.clone());
        session.begin_delay().unwrap();
        session.stop();
        session.stop();

        let result = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(result.outcome, FinishOutcome::NotStarted);
        assert_eq!(session.state(), SessionState::Delaying);
        assert_eq!(session.start(), Err(SessionError::Finished));
        assert!(engine.calls().is_empty());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_paused_time_is_not_recorded() {
        let (session, rx) = configured(Arc::new(FakeEngine::default()));
        session.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        session.pause().unwrap();
        std::thread::sleep(Duration::from_millis(200));
        session.resume().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        session.stop();

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.segments, 2);
        assert!(result.recorded >= Duration::from_millis(60));
        assert!(result.recorded < Duration::from_millis(200));
    }
}
