//! Commands understood by the legacy signature bridge.

use serde::{Deserialize, Serialize};

/// LCD destination used when writing prompt text to the foreground layer
pub const LCD_DEST_FOREGROUND: u8 = 0;

/// LCD refresh mode that clears the given region
pub const LCD_MODE_CLEAR: u8 = 0;

/// LCD refresh/write mode that draws in complement (visible on white)
pub const LCD_MODE_COMPLEMENT: u8 = 2;

/// A single bridge command with its parameters.
///
/// Serialized adjacently tagged so the wire form is
/// `{"command": "...", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "params")]
pub enum BridgeCommand {
    /// Query whether the tablet is connected/active (0 or 1)
    TabletState,
    /// Enable or disable pen capture on the tablet
    SetTabletState { enabled: bool },
    /// Number of points captured since the last clear
    NumberOfTabletPoints,
    /// Raw flat coordinate list of the current signature
    GetSigString,
    ClearTablet,
    Reset,
    TabletModelNumber,
    #[serde(rename = "LCDWriteString")]
    LcdWriteString {
        dest: u8,
        mode: u8,
        x: u32,
        y: u32,
        text: String,
    },
    #[serde(rename = "LCDRefresh")]
    LcdRefresh {
        mode: u8,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

impl BridgeCommand {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::TabletState => "TabletState",
            Self::SetTabletState { .. } => "SetTabletState",
            Self::NumberOfTabletPoints => "NumberOfTabletPoints",
            Self::GetSigString => "GetSigString",
            Self::ClearTablet => "ClearTablet",
            Self::Reset => "Reset",
            Self::TabletModelNumber => "TabletModelNumber",
            Self::LcdWriteString { .. } => "LCDWriteString",
            Self::LcdRefresh { .. } => "LCDRefresh",
        }
    }
}
