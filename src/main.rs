// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use frame_capture::backends::{self, BackendType};
use frame_capture::config::Config;
use frame_capture::constants::timing;
use frame_capture::errors::AppError;
use frame_capture::terminal::{self, ViewerOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

mod cli;

#[derive(Parser)]
#[command(name = "frame-capture")]
#[command(about = "Read and display video frames from cameras, files and streams")]
#[command(version)]
struct Cli {
    /// Source descriptor: device index, file path, URL or GStreamer pipeline
    source: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read frames without a display and log progress
    #[arg(long)]
    headless: bool,

    /// Stop after N frames
    #[arg(short = 'n', long)]
    max_frames: Option<u64>,

    /// Directory where snapshots are saved
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Print the compiled-in capture backend and exit
    #[arg(long)]
    backend_info: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not usage errors
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    // RUST_LOG takes precedence over the configured filter
    // Examples: RUST_LOG=debug, RUST_LOG=frame_capture=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if cli.backend_info {
        print_backend_info();
        return ExitCode::SUCCESS;
    }

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Capture failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.snapshot_dir {
        config.snapshot_dir = dir.clone();
    }
    Ok(config)
}

fn print_backend_info() {
    let selected = backends::selected_backend();
    println!("Capture backend: {}", selected);
    for backend in BackendType::ALL {
        let status = if backend == selected {
            "selected"
        } else if backends::available_backends().contains(&backend) {
            "compiled"
        } else {
            "not compiled"
        };
        let model = if backend.is_push_based() { "push" } else { "pull" };
        println!(
            "  {:<10} {:<13} {} (feature \"{}\")",
            backend.to_string(),
            status,
            model,
            backend.feature_name()
        );
    }
}

fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let source = cli.source.unwrap_or_else(|| config.default_source.clone());

    let mut capture = backends::create();
    capture.set_read_timeout(config.read_timeout());
    info!(backend = %capture.backend_type(), source = %source, "Opening source");

    if !capture.initialize(&source) {
        return Err(AppError::Other(format!("Failed to initialize capture for '{}'", source)).into());
    }

    let result: Result<u64, Box<dyn std::error::Error>> = if cli.headless {
        cli::run_headless(
            capture.as_mut(),
            &cli::HeadlessOptions {
                max_frames: cli.max_frames,
                log_interval: config.headless_log_interval,
            },
        )
    } else {
        terminal::run(
            capture.as_mut(),
            &ViewerOptions {
                snapshot_dir: config.snapshot_dir.clone(),
                poll_interval: config.poll_interval(),
                read_timeout: config
                    .read_timeout()
                    .unwrap_or(Duration::from_millis(timing::VIEWER_READ_TIMEOUT_MS)),
                max_frames: cli.max_frames,
                mirror: config.mirror_preview,
            },
        )
        .map_err(Into::into)
    };

    capture.release();

    let frames = result?;
    info!(frames, "Capture finished");
    Ok(())
}
