//! padsign capture - one capture contract over every signature transport
//!
//! [`CaptureController`] detects the best available transport, runs capture
//! sessions against it and publishes [`CaptureSnapshot`]s for the UI.

mod controller;
mod error;
mod transports;

pub use controller::CaptureController;
pub use error::CaptureError;
pub use transports::TransportSet;

pub use padsign_ipc::{CaptureSnapshot, SignatureResult};
