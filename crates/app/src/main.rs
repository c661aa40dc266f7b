//! padsign - detect a signature pad and capture a signature from it

mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use padsign_capture::CaptureController;
use padsign_config::CaptureConfig;
use padsign_ink::sig_string_to_svg_path;
use padsign_transport::shared_canvas;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file; `PADSIGN_*` variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the available transport and print the controller state
    Probe,

    /// Capture one signature from the pad
    Capture {
        /// Seconds to wait before stopping (Ctrl-C stops early)
        #[arg(long, default_value_t = 30)]
        seconds: u64,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Prompt shown on the pad's LCD
        #[arg(long)]
        message: Option<String>,
    },

    /// Convert a vendor coordinate string into a fitted path
    Convert {
        sig_string: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<CaptureConfig, AppError> {
    let config = match path {
        Some(path) => {
            let mut config = CaptureConfig::load(path)?;
            config.apply_env()?;
            config
        }
        None => CaptureConfig::from_env()?,
    };
    Ok(config)
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Probe => {
            let controller =
                CaptureController::from_config(config.clone(), shared_canvas(config.canvas))?;
            let snapshot = controller.connect().await;
            controller.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Command::Capture {
            seconds,
            width,
            height,
            message,
        } => {
            let width = width.unwrap_or(config.canvas.width);
            let height = height.unwrap_or(config.canvas.height);
            capture(config, seconds, width, height, message.as_deref()).await
        }
        Command::Convert {
            sig_string,
            width,
            height,
        } => {
            let width = width.unwrap_or(config.canvas.width);
            let height = height.unwrap_or(config.canvas.height);
            println!(
                "{}",
                sig_string_to_svg_path(&sig_string, f64::from(width), f64::from(height))
            );
            Ok(())
        }
    }
}

async fn capture(
    config: CaptureConfig,
    seconds: u64,
    width: u32,
    height: u32,
    message: Option<&str>,
) -> Result<(), AppError> {
    let controller =
        CaptureController::from_config(config.clone(), shared_canvas(config.canvas))?;
    let snapshot = controller.connect().await;
    if !snapshot.connection_type.is_hardware() {
        controller.shutdown().await;
        return Err(AppError::NoPad(
            snapshot
                .last_error
                .unwrap_or_else(|| "only the canvas fallback is available".to_string()),
        ));
    }

    controller.start_capture(message).await?;
    info!(
        "Capturing on {} for up to {}s, press Ctrl-C to finish",
        snapshot.connection_type.label(),
        seconds
    );

    let mut updates = controller.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupted);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut interrupted => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if !snapshot.is_capturing {
                    break;
                }
                info!("{} points captured", snapshot.point_count);
            }
        }
    }

    let result = controller
        .stop_capture(f64::from(width), f64::from(height))
        .await;
    controller.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
