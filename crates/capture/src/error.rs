use padsign_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No capture transport is connected")]
    NotConnected,

    #[error("A capture session is already running")]
    AlreadyCapturing,

    #[error("Active transport changed while the command was running")]
    Superseded,

    #[error("Capture controller has been shut down")]
    ShutDown,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
