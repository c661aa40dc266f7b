//! Signature pad transports for padsign
//!
//! Every backend that can produce a signature implements [`SignatureTransport`]:
//! - [`LocalServiceClient`] - vendor local web service over HTTP(S)
//! - [`LegacyBridgeClient`] - WebSocket bridge, or an in-process [`LegacyPlugin`]
//! - [`CanvasTransport`] - on-screen drawing when no pad is reachable

mod bridge;
mod canvas;
mod local_service;
mod plugin;

pub use bridge::LegacyBridgeClient;
pub use canvas::{CanvasTransport, SharedCanvas, lock_canvas, shared_canvas};
pub use local_service::LocalServiceClient;
pub use plugin::LegacyPlugin;

use std::time::Duration;

use async_trait::async_trait;
use padsign_ipc::{ConnectionType, IpcError, ProbeResult};
use thiserror::Error;
use tracing::debug;

/// LCD width of the pad models with an onboard screen, in pad pixels
pub const LCD_WIDTH: u32 = 240;

/// LCD height of the pad models with an onboard screen, in pad pixels
pub const LCD_HEIGHT: u32 = 64;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {status} for {operation}")]
    Status { operation: String, status: u16 },

    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Bridge connection closed")]
    BridgeClosed,

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] IpcError),

    #[error("Plugin call failed: {0}")]
    Plugin(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Capability set shared by every signature backend.
///
/// Passive queries have infallible forms (`tablet_state`, `point_count`) that
/// fold failures into "not connected" / zero, for polling. User-initiated
/// commands return errors.
#[async_trait]
pub trait SignatureTransport: Send + Sync {
    fn kind(&self) -> ConnectionType;

    /// Detect whether this transport can be used. Never fails; an unreachable
    /// backend reports `available == false`.
    async fn probe(&self) -> ProbeResult;

    async fn try_tablet_state(&self) -> Result<bool, TransportError>;

    async fn try_point_count(&self) -> Result<u32, TransportError>;

    /// Tablet connectivity, `false` on any failure
    async fn tablet_state(&self) -> bool {
        match self.try_tablet_state().await {
            Ok(state) => state,
            Err(e) => {
                debug!("{}: tablet state query failed: {}", self.kind().label(), e);
                false
            }
        }
    }

    /// Captured point count, 0 on any failure
    async fn point_count(&self) -> u32 {
        match self.try_point_count().await {
            Ok(count) => count,
            Err(e) => {
                debug!("{}: point count query failed: {}", self.kind().label(), e);
                0
            }
        }
    }

    async fn start_capture(&self, message: Option<&str>) -> Result<(), TransportError>;

    async fn stop_capture(&self) -> Result<(), TransportError>;

    async fn clear_signature(&self) -> Result<(), TransportError>;

    async fn reset_tablet(&self) -> Result<(), TransportError>;

    /// Current signature as a path fitted to `width` x `height`
    async fn svg_path(&self, width: f64, height: f64) -> Result<String, TransportError>;

    /// Show a prompt on the pad's LCD, if it has one. Cosmetic only.
    async fn show_prompt(&self, _message: &str) {}

    /// Blank the pad's LCD, if it has one. Cosmetic only.
    async fn clear_display(&self) {}

    /// Release any held connection
    async fn disconnect(&self) {}
}

/// Interpret a service/bridge scalar (number or numeric string)
pub(crate) fn scalar_to_i64(value: &serde_json::Value) -> Result<i64, TransportError> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| TransportError::InvalidResponse(n.to_string())),
        serde_json::Value::String(s) => parse_numeric_body(s),
        serde_json::Value::Bool(b) => Ok(*b as i64),
        other => Err(TransportError::InvalidResponse(other.to_string())),
    }
}

/// Parse a plain-text numeric body such as `"1\r\n"`
pub(crate) fn parse_numeric_body(body: &str) -> Result<i64, TransportError> {
    let trimmed = body.trim();
    trimmed
        .parse::<i64>()
        .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
        .map_err(|_| TransportError::InvalidResponse(format!("expected number, got {trimmed:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_parsing() {
        assert_eq!(scalar_to_i64(&json!(1)).unwrap(), 1);
        assert_eq!(scalar_to_i64(&json!("42")).unwrap(), 42);
        assert_eq!(scalar_to_i64(&json!(true)).unwrap(), 1);
        assert!(scalar_to_i64(&json!(null)).is_err());
        assert_eq!(parse_numeric_body(" 7\r\n").unwrap(), 7);
        assert!(parse_numeric_body("nope").is_err());
    }
}
