use std::sync::Arc;

use padsign_config::CaptureConfig;
use padsign_transport::{
    CanvasTransport, LegacyBridgeClient, LegacyPlugin, LocalServiceClient, SharedCanvas,
    SignatureTransport, TransportError,
};

/// The transports one controller owns.
///
/// Each controller gets its own set, so endpoint caches and bridge sockets are
/// never shared between controllers.
pub struct TransportSet {
    pub local_service: Arc<dyn SignatureTransport>,
    pub legacy_bridge: Arc<dyn SignatureTransport>,
    pub canvas: Arc<dyn SignatureTransport>,
}

impl TransportSet {
    pub fn from_config(config: &CaptureConfig, canvas: SharedCanvas) -> Result<Self, TransportError> {
        Ok(Self {
            local_service: Arc::new(LocalServiceClient::new(config)?),
            legacy_bridge: Arc::new(LegacyBridgeClient::new(config)),
            canvas: Arc::new(CanvasTransport::new(canvas)),
        })
    }

    /// Like [`TransportSet::from_config`], with an in-process legacy plugin
    /// behind the bridge client
    pub fn with_plugin(
        config: &CaptureConfig,
        canvas: SharedCanvas,
        plugin: Arc<dyn LegacyPlugin>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            local_service: Arc::new(LocalServiceClient::new(config)?),
            legacy_bridge: Arc::new(LegacyBridgeClient::new(config).with_plugin(plugin)),
            canvas: Arc::new(CanvasTransport::new(canvas)),
        })
    }

    /// Hardware transports in probe order
    pub(crate) fn hardware_order(
        &self,
        prefer_local_service: bool,
    ) -> [Arc<dyn SignatureTransport>; 2] {
        if prefer_local_service {
            [self.local_service.clone(), self.legacy_bridge.clone()]
        } else {
            [self.legacy_bridge.clone(), self.local_service.clone()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padsign_config::CanvasConfig;
    use padsign_ipc::ConnectionType;
    use padsign_transport::shared_canvas;

    use crate::CaptureController;

    struct DeskPad;

    impl LegacyPlugin for DeskPad {
        fn tablet_state(&self) -> Result<i32, String> {
            Ok(1)
        }

        fn set_tablet_state(&self, _enabled: bool) -> Result<(), String> {
            Ok(())
        }

        fn number_of_tablet_points(&self) -> Result<u32, String> {
            Ok(0)
        }

        fn get_sig_string(&self) -> Result<String, String> {
            Ok(String::new())
        }

        fn clear_tablet(&self) -> Result<(), String> {
            Ok(())
        }

        fn model_number(&self) -> Result<String, String> {
            Ok("T-LBK462".into())
        }

        fn lcd_write_string(&self, _: u8, _: u8, _: u32, _: u32, _: &str) -> Result<(), String> {
            Ok(())
        }

        fn lcd_refresh(&self, _: u8, _: u32, _: u32, _: u32, _: u32) -> Result<(), String> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_plugin_set_connects_through_bridge() {
        let mut config = CaptureConfig::default();
        config.local_service.enabled = false;
        config.bridge.enabled = false;
        let canvas = shared_canvas(CanvasConfig::default());

        let set = TransportSet::with_plugin(&config, canvas, Arc::new(DeskPad)).unwrap();
        let controller = CaptureController::new(config, set);

        let snapshot = controller.connect().await;
        assert_eq!(snapshot.connection_type, ConnectionType::LegacyBridge);
        assert!(snapshot.tablet_connected);
        assert_eq!(snapshot.model.as_deref(), Some("T-LBK462"));
        controller.shutdown().await;
    }
}
