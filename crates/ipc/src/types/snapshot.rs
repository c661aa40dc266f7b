//! State exposed to the UI layer.

use serde::{Deserialize, Serialize};

use super::{CaptureStatus, ConnectionState, ConnectionType};

/// Final result of a capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    pub has_signature: bool,
    pub svg_path: String,
}

impl SignatureResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_path(svg_path: String) -> Self {
        Self {
            has_signature: !svg_path.is_empty(),
            svg_path,
        }
    }
}

/// Point-in-time view of the capture controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub connection_type: ConnectionType,
    pub connection_state: ConnectionState,
    /// A physical pad transport is active
    pub is_connected: bool,
    /// `start_capture` is allowed (hardware or canvas)
    pub can_capture: bool,
    pub is_capturing: bool,
    pub capture_status: CaptureStatus,
    pub tablet_connected: bool,
    pub model: Option<String>,
    pub point_count: u32,
    pub last_error: Option<String>,
    pub consecutive_poll_failures: u32,
}
