//! In-process legacy pad plugin
//!
//! Older pad SDKs expose a synchronous control object living inside the host
//! process. Where such an object exists it is wrapped in [`LegacyPlugin`] and
//! handed to the bridge client as its last-resort link; where it does not
//! (every modern runtime) no provider is configured and the bridge simply
//! reports unavailable.

use std::sync::Arc;

use padsign_ipc::BridgeCommand;
use serde_json::{Value, json};

use crate::TransportError;

/// Synchronous surface of the legacy control object.
pub trait LegacyPlugin: Send + Sync {
    /// 1 when the tablet is connected and active, 0 otherwise
    fn tablet_state(&self) -> Result<i32, String>;

    fn set_tablet_state(&self, enabled: bool) -> Result<(), String>;

    fn number_of_tablet_points(&self) -> Result<u32, String>;

    /// Flat `x,y,...` coordinate list with `0,0` pen-up sentinels
    fn get_sig_string(&self) -> Result<String, String>;

    fn clear_tablet(&self) -> Result<(), String>;

    fn reset(&self) -> Result<(), String> {
        self.clear_tablet()
    }

    fn model_number(&self) -> Result<String, String> {
        Ok(String::new())
    }

    fn lcd_write_string(&self, dest: u8, mode: u8, x: u32, y: u32, text: &str)
    -> Result<(), String>;

    fn lcd_refresh(&self, mode: u8, x: u32, y: u32, width: u32, height: u32)
    -> Result<(), String>;
}

/// Execute a bridge command against the plugin, producing the same JSON
/// result the WebSocket bridge would return.
pub(crate) fn dispatch(plugin: &dyn LegacyPlugin, command: &BridgeCommand) -> Result<Value, String> {
    match command {
        BridgeCommand::TabletState => plugin.tablet_state().map(|v| json!(v)),
        BridgeCommand::SetTabletState { enabled } => {
            plugin.set_tablet_state(*enabled).map(|_| Value::Null)
        }
        BridgeCommand::NumberOfTabletPoints => plugin.number_of_tablet_points().map(|v| json!(v)),
        BridgeCommand::GetSigString => plugin.get_sig_string().map(Value::String),
        BridgeCommand::ClearTablet => plugin.clear_tablet().map(|_| Value::Null),
        BridgeCommand::Reset => plugin.reset().map(|_| Value::Null),
        BridgeCommand::TabletModelNumber => plugin.model_number().map(Value::String),
        BridgeCommand::LcdWriteString {
            dest,
            mode,
            x,
            y,
            text,
        } => plugin
            .lcd_write_string(*dest, *mode, *x, *y, text)
            .map(|_| Value::Null),
        BridgeCommand::LcdRefresh {
            mode,
            x,
            y,
            width,
            height,
        } => plugin
            .lcd_refresh(*mode, *x, *y, *width, *height)
            .map(|_| Value::Null),
    }
}

/// Run a command on the blocking pool so a slow control object never stalls
/// the async executor.
pub(crate) async fn call_plugin(
    plugin: Arc<dyn LegacyPlugin>,
    command: BridgeCommand,
) -> Result<Value, TransportError> {
    tokio::task::spawn_blocking(move || dispatch(plugin.as_ref(), &command))
        .await
        .map_err(|e| TransportError::Plugin(format!("plugin call panicked: {e}")))?
        .map_err(TransportError::Plugin)
}
