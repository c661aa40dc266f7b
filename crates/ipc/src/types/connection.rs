//! Transport and capture state enums.

use serde::{Deserialize, Serialize};

/// Which backend is currently producing signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionType {
    #[default]
    None,
    /// Vendor local web service over HTTP(S)
    LocalService,
    /// WebSocket bridge or in-process legacy plugin
    LegacyBridge,
    /// In-app drawing surface, no physical pad
    Canvas,
}

impl ConnectionType {
    /// True for transports backed by a physical pad
    pub fn is_hardware(self) -> bool {
        matches!(self, Self::LocalService | Self::LegacyBridge)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LocalService => "local-service",
            Self::LegacyBridge => "legacy-bridge",
            Self::Canvas => "canvas",
        }
    }
}

/// Connection lifecycle of the capture controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Detecting,
    Connected,
    /// No physical pad; capture still possible through the canvas
    Disconnected,
    /// Detection failed with no fallback. Leave with `connect()`.
    Error,
}

/// Lifecycle of one signing interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    #[default]
    Idle,
    Capturing,
    Stopped,
}

/// Outcome of probing one transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub available: bool,
    pub tablet_connected: bool,
    pub model: Option<String>,
    /// Why the transport is unavailable, when known
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn available(tablet_connected: bool, model: Option<String>) -> Self {
        Self {
            available: true,
            tablet_connected,
            model,
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            tablet_connected: false,
            model: None,
            error: Some(error.into()),
        }
    }
}
