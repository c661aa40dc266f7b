use padsign_capture::CaptureError;
use padsign_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("No signature pad found: {0}")]
    NoPad(String),
}
