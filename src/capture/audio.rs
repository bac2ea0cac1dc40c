//! Microphone capture using cpal
//!
//! Samples are converted to f32 in the stream callback, handed to a writer
//! thread and piped into an FFmpeg AAC encoder. The cpal stream lives and
//! dies on that thread.

use super::ffmpeg::FfmpegProcess;
use super::native::find_audio_input;
use crate::utils::SinkError;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Running microphone capture feeding an AAC encoder
pub struct AudioCapture {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<u64, SinkError>>>,
}

impl AudioCapture {
    /// Open `device_name` and start encoding to `output`.
    ///
    /// Returns once the stream is playing, or with the error that prevented it.
    pub fn start(
        ffmpeg: &Path,
        device_name: &str,
        output: &Path,
        paused: Arc<AtomicBool>,
    ) -> Result<Self, SinkError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let ffmpeg = ffmpeg.to_path_buf();
            let device_name = device_name.to_string();
            let output = output.to_path_buf();
            let running = running.clone();
            std::thread::Builder::new()
                .name("camsnap-audio".to_string())
                .spawn(move || capture_loop(ffmpeg, device_name, output, running, paused, ready_tx))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                running,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SinkError::Device("audio capture thread exited early".to_string()))
            }
        }
    }

    /// Stop the stream and wait for the encoder to close the file.
    /// Returns the number of samples written.
    pub fn finish(mut self) -> Result<u64, SinkError> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SinkError::Device("audio capture thread panicked".to_string()))?,
            None => Ok(0),
        }
    }
}

fn capture_loop(
    ffmpeg: PathBuf,
    device_name: String,
    output: PathBuf,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    ready: Sender<Result<(), SinkError>>,
) -> Result<u64, SinkError> {
    let (samples_tx, samples_rx) = mpsc::channel::<Vec<f32>>();

    let opened = open_stream(&ffmpeg, &device_name, &output, samples_tx, paused);
    let (stream, mut encoder) = match opened {
        Ok(parts) => parts,
        Err(e) => {
            let message = e.to_string();
            let _ = ready.send(Err(e));
            return Err(SinkError::Device(message));
        }
    };
    let _ = ready.send(Ok(()));

    let written = pump(&samples_rx, &mut encoder, &running);

    drop(stream);
    // Drain whatever the callback queued before the stream closed
    let mut tail = 0u64;
    while let Ok(chunk) = samples_rx.try_recv() {
        tail += chunk.len() as u64;
        encoder.write(&to_bytes(&chunk));
    }

    encoder.finish()?;
    let total = written + tail;
    tracing::info!("Audio capture finished: {} samples", total);
    Ok(total)
}

fn open_stream(
    ffmpeg: &Path,
    device_name: &str,
    output: &Path,
    samples: Sender<Vec<f32>>,
    paused: Arc<AtomicBool>,
) -> Result<(cpal::Stream, FfmpegProcess), SinkError> {
    let device = find_audio_input(device_name)
        .ok_or_else(|| SinkError::Device(format!("audio input '{}' not found", device_name)))?;
    let supported = device
        .default_input_config()
        .map_err(|e| SinkError::Device(format!("no usable input config: {}", e)))?;
    let config: cpal::StreamConfig = supported.config();

    let encoder = FfmpegProcess::spawn(
        ffmpeg,
        &audio_encoder_args(config.sample_rate.0, config.channels, output),
    )?;

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, paused),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, paused),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, paused),
        SampleFormat::I32 => build_stream::<i32>(&device, &config, samples, paused),
        other => {
            return Err(SinkError::Device(format!("unsupported sample format {:?}", other)));
        }
    }
    .map_err(|e| SinkError::Device(format!("failed to build input stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| SinkError::Device(format!("failed to start input stream: {}", e)))?;

    tracing::info!(
        "Audio capture started on '{}': {} Hz, {} channel(s)",
        device_name,
        config.sample_rate.0,
        config.channels
    );
    Ok((stream, encoder))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Sender<Vec<f32>>,
    paused: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if paused.load(Ordering::Relaxed) {
                return;
            }
            let chunk: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
            let _ = samples.send(chunk);
        },
        |err| tracing::error!("Audio stream error: {}", err),
        None,
    )
}

fn pump(samples: &Receiver<Vec<f32>>, encoder: &mut FfmpegProcess, running: &AtomicBool) -> u64 {
    let mut written = 0u64;
    while running.load(Ordering::SeqCst) {
        match samples.recv_timeout(Duration::from_millis(50)) {
            Ok(chunk) => {
                written += chunk.len() as u64;
                if !encoder.write(&to_bytes(&chunk)) {
                    tracing::warn!("Audio encoder stopped accepting samples");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    written
}

fn to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// FFmpeg arguments for interleaved f32le PCM on stdin to AAC
pub(crate) fn audio_encoder_args(sample_rate: u32, channels: u16, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "f32le".to_string(),
        "-ar".to_string(),
        sample_rate.to_string(),
        "-ac".to_string(),
        channels.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_args_describe_input_format() {
        let args = audio_encoder_args(48000, 2, Path::new("/tmp/a.m4a"));
        let joined = args.join(" ");
        assert!(joined.contains("-f f32le -ar 48000 -ac 2 -i -"));
        assert!(joined.ends_with("/tmp/a.m4a"));
    }

    #[test]
    fn test_samples_are_little_endian() {
        let bytes = to_bytes(&[1.0, -0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
    }
}
