//! Scripted registry, engine and sink for tests

use crate::capture::{
    CaptureDevice, CaptureEngine, DeviceRegistry, OutputSink, SinkSpec, SinkSummary,
};
use crate::utils::SinkError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// Device registry backed by a mutable list
pub struct FakeRegistry {
    devices: Mutex<Vec<CaptureDevice>>,
    default_audio: Option<CaptureDevice>,
}

impl FakeRegistry {
    pub fn new(devices: Vec<CaptureDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            default_audio: None,
        }
    }

    pub fn with_default_audio(mut self, device: CaptureDevice) -> Self {
        self.default_audio = Some(device);
        self
    }

    pub fn attach(&self, device: CaptureDevice) {
        self.devices.lock().push(device);
    }

    pub fn detach(&self, name: &str) {
        self.devices.lock().retain(|d| d.name != name);
    }
}

impl DeviceRegistry for FakeRegistry {
    fn devices(&self) -> Vec<CaptureDevice> {
        self.devices.lock().clone()
    }

    fn default_audio_device(&self) -> Option<CaptureDevice> {
        self.default_audio.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    Start,
    Pause,
    Resume,
    Finish,
}

/// Engine whose sinks log every call and behave as scripted
#[derive(Default)]
pub struct FakeEngine {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    /// Threads that opened or started a sink
    threads: Arc<Mutex<Vec<ThreadId>>>,
    opened: AtomicUsize,
    refuse_open: Option<String>,
    fail_start: Option<String>,
    fail_finish: Option<String>,
    finish_delay: Duration,
}

impl FakeEngine {
    pub fn refuse_open(mut self, message: &str) -> Self {
        self.refuse_open = Some(message.to_string());
        self
    }

    pub fn fail_start(mut self, message: &str) -> Self {
        self.fail_start = Some(message.to_string());
        self
    }

    pub fn fail_finish(mut self, message: &str) -> Self {
        self.fail_finish = Some(message.to_string());
        self
    }

    pub fn finish_after(mut self, delay: Duration) -> Self {
        self.finish_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn device_threads(&self) -> Vec<ThreadId> {
        self.threads.lock().clone()
    }

    pub fn sinks_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl CaptureEngine for FakeEngine {
    fn open_sink(&self, _spec: &SinkSpec) -> Result<Box<dyn OutputSink>, SinkError> {
        if let Some(message) = &self.refuse_open {
            return Err(SinkError::Encoder(message.clone()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().push(std::thread::current().id());
        Ok(Box::new(FakeSink {
            calls: self.calls.clone(),
            threads: self.threads.clone(),
            fail_start: self.fail_start.clone(),
            fail_finish: self.fail_finish.clone(),
            finish_delay: self.finish_delay,
        }))
    }
}

struct FakeSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
    fail_start: Option<String>,
    fail_finish: Option<String>,
    finish_delay: Duration,
}

impl OutputSink for FakeSink {
    fn start(&mut self) -> Result<(), SinkError> {
        if let Some(message) = &self.fail_start {
            return Err(SinkError::Device(message.clone()));
        }
        self.threads.lock().push(std::thread::current().id());
        self.calls.lock().push(SinkCall::Start);
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.lock().push(SinkCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.lock().push(SinkCall::Resume);
    }

    fn finish(self: Box<Self>) -> Result<SinkSummary, SinkError> {
        self.calls.lock().push(SinkCall::Finish);
        std::thread::sleep(self.finish_delay);
        match self.fail_finish {
            Some(message) => Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                message,
            ))),
            None => Ok(SinkSummary::default()),
        }
    }
}
