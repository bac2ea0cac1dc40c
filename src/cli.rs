//! Command-line surface
//!
//! Parses arguments into a [`RunnerConfig`]. Help text and defaults live here;
//! the recording logic does not know about clap.

use crate::recorder::runner::DEFAULT_FINALIZE_TIMEOUT;
use crate::recorder::{EncodingPreset, RunnerConfig};
use crate::utils::default_filename;
use chrono::{DateTime, TimeZone};
use clap::Parser;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

/// Record a movie from an attached capture device.
///
/// Ctrl+C (SIGINT/SIGTERM) stops and finalizes the recording, Ctrl+Z (SIGTSTP)
/// toggles pause.
#[derive(Parser, Debug)]
#[command(name = "camsnap", version)]
pub struct Cli {
    /// Output movie file (defaults to a timestamped name in the current directory)
    pub output: Option<PathBuf>,

    /// Device to record from, by name or index (defaults to the first device)
    #[arg(short, long)]
    pub device: Option<String>,

    /// List attached video devices and exit
    #[arg(short, long)]
    pub list_devices: bool,

    /// Stop recording after this many seconds
    #[arg(short = 't', long, value_parser = parse_seconds)]
    pub duration: Option<Duration>,

    /// Wait this many seconds before recording starts
    #[arg(short = 'w', long, value_parser = parse_seconds, default_value = "0")]
    pub delay: Duration,

    /// Encoding preset: Low, Medium, High, 640x480, 960x540, 1280x720, 1920x1080, 3840x2160
    #[arg(short, long, default_value_t = EncodingPreset::High)]
    pub preset: EncodingPreset,

    /// Record video only
    #[arg(long)]
    pub no_audio: bool,

    /// Give up waiting for the file to be finalized after this many seconds
    #[arg(long, value_parser = parse_seconds, default_value = "30")]
    pub finalize_timeout: Duration,

    /// Print the final result as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the runner configuration, naming the output after `now` if needed
    pub fn runner_config<Tz>(&self, now: &DateTime<Tz>) -> RunnerConfig
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let output_path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_filename(now)));

        RunnerConfig {
            device: self.device.clone(),
            output_path,
            duration: self.duration,
            delay: self.delay,
            preset: self.preset,
            audio: !self.no_audio,
            finalize_timeout: if self.finalize_timeout.is_zero() {
                DEFAULT_FINALIZE_TIMEOUT
            } else {
                self.finalize_timeout
            },
        }
    }
}

/// Parse a non-negative number of seconds, fractions allowed
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("'{}' must be a non-negative number of seconds", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{}' is too many seconds", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["camsnap"]);
        assert!(cli.output.is_none());
        assert_eq!(cli.delay, Duration::ZERO);
        assert_eq!(cli.preset, EncodingPreset::High);
        assert!(!cli.no_audio && !cli.list_devices && !cli.verbose);
    }

    #[test]
    fn test_full_invocation() {
        let cli = parse(&[
            "camsnap", "-d", "Cam1", "-t", "5", "-w", "1.5", "-p", "1280x720", "--no-audio", "-v",
            "clip.mov",
        ]);
        assert_eq!(cli.device.as_deref(), Some("Cam1"));
        assert_eq!(cli.duration, Some(Duration::from_secs(5)));
        assert_eq!(cli.delay, Duration::from_millis(1500));
        assert_eq!(cli.preset, EncodingPreset::Hd720);
        assert!(cli.no_audio && cli.verbose);
        assert_eq!(cli.output, Some(PathBuf::from("clip.mov")));
    }

    #[test]
    fn test_list_devices_short_flag() {
        assert!(parse(&["camsnap", "-l"]).list_devices);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["camsnap", "-t", "-3"]).is_err());
        assert!(Cli::try_parse_from(["camsnap", "-t", "soon"]).is_err());
        assert!(Cli::try_parse_from(["camsnap", "-p", "Ultra"]).is_err());
        assert!(Cli::try_parse_from(["camsnap", "-t", "1e30"]).is_err());
        assert!(Cli::try_parse_from(["camsnap", "-w", "1e30"]).is_err());
        assert!(Cli::try_parse_from(["camsnap", "--finalize-timeout", "1e30"]).is_err());
    }

    #[test]
    fn test_runner_config_uses_default_filename() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let config = parse(&["camsnap", "--no-audio"]).runner_config(&now);
        assert_eq!(config.output_path, PathBuf::from("camsnap-2026-10-16-090000.mov"));
        assert!(!config.audio);
        assert_eq!(config.finalize_timeout, DEFAULT_FINALIZE_TIMEOUT);
    }
}
