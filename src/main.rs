//! `camsnap` -- record a movie from an attached capture device.

use anyhow::Result;
use camsnap_lib::capture::{DeviceCatalog, FfmpegEngine, NativeRegistry};
use camsnap_lib::cli::Cli;
use camsnap_lib::recorder::{SessionRunner, SignalBridge};
use camsnap_lib::utils::RunError;
use camsnap_lib::{init_tracing, LogConfig};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(LogConfig {
        verbose: cli.verbose,
    });

    let catalog = DeviceCatalog::new(Arc::new(NativeRegistry::new()));

    if cli.list_devices {
        print!("{}", catalog.listing());
        return Ok(());
    }

    let config = cli.runner_config(&chrono::Local::now());
    let signals = SignalBridge::listen()?;
    let runner = SessionRunner::new(catalog.clone(), Arc::new(FfmpegEngine::default()), config);

    eprintln!("Recording... press Ctrl+C to stop, Ctrl+Z to pause/resume");

    let code = match runner.run(signals).await {
        Ok(report) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.result.summary());
            }
            report.exit_code()
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, RunError::DeviceNotFound(_)) {
                eprint!("{}", catalog.listing());
            }
            e.exit_code()
        }
    };

    std::process::exit(code);
}
