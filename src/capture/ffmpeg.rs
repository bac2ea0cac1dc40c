//! FFmpeg-backed capture engine
//!
//! Camera frames are captured with nokhwa on a dedicated thread and piped raw
//! into an FFmpeg H.264 encoder. While paused, frames are dropped, so paused
//! time never reaches the file. When audio is attached, video and audio are
//! encoded to temporary tracks and muxed into the output on finish.

use super::audio::AudioCapture;
use super::native::camera_index;
use super::traits::{CaptureDevice, CaptureEngine, OutputSink, SinkSpec, SinkSummary};
use crate::recorder::preset::EncodingPreset;
use crate::utils::SinkError;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// An FFmpeg child process fed through stdin
pub struct FfmpegProcess {
    process: Option<Child>,
    label: String,
}

impl FfmpegProcess {
    pub fn spawn(ffmpeg: &Path, args: &[String]) -> Result<Self, SinkError> {
        let mut command = Command::new(ffmpeg);
        command
            .args(["-hide_banner", "-nostats", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let process = detach_from_terminal(&mut command)
            .spawn()
            .map_err(|e| SinkError::Encoder(format!("Failed to start FFmpeg: {}", e)))?;

        let label = args.last().cloned().unwrap_or_default();
        tracing::debug!("Started FFmpeg for {}: {:?}", label, args);
        Ok(Self {
            process: Some(process),
            label,
        })
    }

    /// Write bytes to stdin; false once the encoder stopped accepting input
    pub fn write(&mut self, data: &[u8]) -> bool {
        match self.process.as_mut().and_then(|p| p.stdin.as_mut()) {
            Some(stdin) => stdin.write_all(data).is_ok(),
            None => false,
        }
    }

    /// Close stdin and wait for FFmpeg to finish writing its output
    pub fn finish(mut self) -> Result<(), SinkError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        // Closing stdin signals EOF
        drop(process.stdin.take());
        let output = process.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SinkError::Encoder(format!(
                "FFmpeg exited with {} while writing {}: {}",
                output.status,
                self.label,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

/// Put the encoder in its own process group so terminal Ctrl+C / Ctrl+Z only
/// reach camsnap, which stops or pauses the encoders itself.
fn detach_from_terminal(command: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command
}

/// Map a nokhwa frame format to FFmpeg input arguments
pub(crate) fn video_input_args(format: FrameFormat, width: u32, height: u32, fps: u32) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match format {
        FrameFormat::MJPEG => args.extend(["-f".to_string(), "mjpeg".to_string()]),
        other => {
            let pix_fmt = match other {
                FrameFormat::YUYV => "yuyv422",
                FrameFormat::NV12 => "nv12",
                FrameFormat::RAWRGB => "rgb24",
                FrameFormat::GRAY => "gray",
                _ => {
                    tracing::warn!("Unknown camera format {:?}, falling back to yuyv422", other);
                    "yuyv422"
                }
            };
            args.extend([
                "-f".to_string(),
                "rawvideo".to_string(),
                "-pixel_format".to_string(),
                pix_fmt.to_string(),
                "-video_size".to_string(),
                format!("{}x{}", width, height),
            ]);
        }
    }
    args.extend(["-framerate".to_string(), fps.max(1).to_string()]);
    args
}

/// FFmpeg encoder arguments for a preset, reading from stdin
pub(crate) fn video_encoder_args(
    input: Vec<String>,
    preset: EncodingPreset,
    fps: u32,
    output: &Path,
) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    args.extend(input);
    args.extend(["-i".to_string(), "-".to_string()]);
    if let Some((width, height)) = preset.resolution() {
        args.extend(["-vf".to_string(), format!("scale={}:{}", width, height)]);
    }
    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        preset.h264_preset().to_string(),
        "-crf".to_string(),
        preset.crf().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-g".to_string(),
        (fps.max(1) * 2).to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// FFmpeg arguments muxing a video and an audio track without re-encoding
pub(crate) fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-shortest".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Capture engine that writes movies with FFmpeg
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl CaptureEngine for FfmpegEngine {
    fn open_sink(&self, spec: &SinkSpec) -> Result<Box<dyn OutputSink>, SinkError> {
        if Command::new(&self.ffmpeg).arg("-version").output().is_err() {
            return Err(SinkError::Encoder(format!(
                "FFmpeg not found at '{}'. Please install FFmpeg",
                self.ffmpeg.display()
            )));
        }
        Ok(Box::new(FfmpegSink::new(self.ffmpeg.clone(), spec.clone())?))
    }
}

struct VideoStats {
    frames: u64,
    elapsed: Duration,
}

/// Output sink writing one movie file
pub struct FfmpegSink {
    ffmpeg: PathBuf,
    spec: SinkSpec,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    /// Holds the intermediate tracks when audio is muxed in
    scratch: Option<tempfile::TempDir>,
    video_thread: Option<JoinHandle<Result<VideoStats, SinkError>>>,
    audio: Option<AudioCapture>,
}

impl FfmpegSink {
    fn new(ffmpeg: PathBuf, spec: SinkSpec) -> Result<Self, SinkError> {
        let parent = spec
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !parent.is_dir() {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("output directory {} does not exist", parent.display()),
            )));
        }

        let scratch = match spec.audio {
            Some(_) => Some(
                tempfile::Builder::new()
                    .prefix(".camsnap-")
                    .tempdir_in(&parent)?,
            ),
            None => None,
        };

        Ok(Self {
            ffmpeg,
            spec,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            scratch,
            video_thread: None,
            audio: None,
        })
    }

    fn video_path(&self) -> PathBuf {
        match &self.scratch {
            Some(dir) => dir.path().join("video.mp4"),
            None => self.spec.output_path.clone(),
        }
    }

    fn audio_path(&self) -> Option<PathBuf> {
        self.scratch.as_ref().map(|dir| dir.path().join("audio.m4a"))
    }

    fn stop_video(&mut self) -> Result<VideoStats, SinkError> {
        self.running.store(false, Ordering::SeqCst);
        match self.video_thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SinkError::Device("video capture thread panicked".to_string()))?,
            None => Err(SinkError::Device("video capture was never started".to_string())),
        }
    }
}

impl OutputSink for FfmpegSink {
    fn start(&mut self) -> Result<(), SinkError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SinkError::Device("sink already started".to_string()));
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = {
            let ffmpeg = self.ffmpeg.clone();
            let device = self.spec.video.clone();
            let preset = self.spec.preset;
            let output = self.video_path();
            let running = self.running.clone();
            let paused = self.paused.clone();
            std::thread::Builder::new()
                .name("camsnap-video".to_string())
                .spawn(move || capture_video(ffmpeg, device, preset, output, running, paused, ready_tx))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => self.video_thread = Some(handle),
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                return Err(SinkError::Device("video capture thread exited early".to_string()));
            }
        }

        if let (Some(device), Some(audio_path)) = (self.spec.audio.clone(), self.audio_path()) {
            match AudioCapture::start(&self.ffmpeg, &device.name, &audio_path, self.paused.clone()) {
                Ok(audio) => self.audio = Some(audio),
                Err(e) => {
                    let _ = self.stop_video();
                    return Err(e);
                }
            }
        }

        tracing::info!("Writing {}", self.spec.output_path.display());
        Ok(())
    }

    fn pause(&mut self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn finish(mut self: Box<Self>) -> Result<SinkSummary, SinkError> {
        let video = self.stop_video();
        let audio = self.audio.take().map(AudioCapture::finish);
        let video = video?;

        if let Some(audio) = audio {
            audio?;
            if let Some(audio_path) = self.audio_path() {
                tracing::info!("Muxing audio into {}", self.spec.output_path.display());
                let mux = FfmpegProcess::spawn(
                    &self.ffmpeg,
                    &mux_args(&self.video_path(), &audio_path, &self.spec.output_path),
                )?;
                mux.finish()?;
            }
        }

        tracing::info!(
            "Finished {}: {} frames in {:.2}s",
            self.spec.output_path.display(),
            video.frames,
            video.elapsed.as_secs_f64()
        );
        Ok(SinkSummary {
            frames_written: video.frames,
            captured: video.elapsed,
        })
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn capture_video(
    ffmpeg: PathBuf,
    device: CaptureDevice,
    preset: EncodingPreset,
    output: PathBuf,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    ready: Sender<Result<(), SinkError>>,
) -> Result<VideoStats, SinkError> {
    let index = camera_index(&device);
    let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);

    let opened = Camera::new(index, format).and_then(|mut camera| {
        camera.open_stream()?;
        Ok(camera)
    });
    let mut camera = match opened {
        Ok(camera) => camera,
        Err(e) => {
            let message = format!("Failed to open camera '{}': {}", device.name, e);
            let _ = ready.send(Err(SinkError::Device(message.clone())));
            return Err(SinkError::Device(message));
        }
    };

    let camera_format = camera.camera_format();
    let width = camera_format.resolution().width();
    let height = camera_format.resolution().height();
    let fps = camera_format.frame_rate();
    let frame_format = camera_format.format();

    tracing::info!(
        "Camera '{}' opened: {}x{} @ {}fps, format={:?}",
        device.name,
        width,
        height,
        fps,
        frame_format
    );

    let input = video_input_args(frame_format, width, height, fps);
    let mut encoder = match FfmpegProcess::spawn(&ffmpeg, &video_encoder_args(input, preset, fps, &output)) {
        Ok(encoder) => encoder,
        Err(e) => {
            let message = e.to_string();
            let _ = camera.stop_stream();
            let _ = ready.send(Err(e));
            return Err(SinkError::Encoder(message));
        }
    };
    let _ = ready.send(Ok(()));

    let started = Instant::now();
    let mut frames: u64 = 0;
    let mut write_failed = false;

    while running.load(Ordering::SeqCst) {
        // Blocks until the camera delivers the next frame
        match camera.frame() {
            Ok(frame) => {
                if paused.load(Ordering::SeqCst) {
                    continue;
                }
                if !encoder.write(frame.buffer()) {
                    tracing::error!("Video encoder stopped accepting frames");
                    write_failed = true;
                    break;
                }
                frames += 1;
            }
            Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }

    let elapsed = started.elapsed();
    tracing::info!("Captured {} frames in {:.2}s", frames, elapsed.as_secs_f64());

    encoder.finish()?;
    if write_failed {
        return Err(SinkError::Encoder("video encoder closed its input early".to_string()));
    }
    Ok(VideoStats { frames, elapsed })
}
