//! On-screen canvas as a transport
//!
//! The capturer is shared with the host UI, which feeds it pointer events.
//! This side only reads and clears it.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use padsign_config::CanvasConfig;
use padsign_ink::CanvasCapturer;
use padsign_ipc::{ConnectionType, ProbeResult};

use crate::{SignatureTransport, TransportError};

pub type SharedCanvas = Arc<Mutex<CanvasCapturer>>;

pub fn shared_canvas(config: CanvasConfig) -> SharedCanvas {
    Arc::new(Mutex::new(CanvasCapturer::new(config)))
}

/// Lock the shared capturer, recovering from a poisoned lock
pub fn lock_canvas(canvas: &SharedCanvas) -> MutexGuard<'_, CanvasCapturer> {
    canvas.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct CanvasTransport {
    canvas: SharedCanvas,
}

impl CanvasTransport {
    pub fn new(canvas: SharedCanvas) -> Self {
        Self { canvas }
    }
}

#[async_trait]
impl SignatureTransport for CanvasTransport {
    fn kind(&self) -> ConnectionType {
        ConnectionType::Canvas
    }

    async fn probe(&self) -> ProbeResult {
        ProbeResult::available(false, None)
    }

    async fn try_tablet_state(&self) -> Result<bool, TransportError> {
        Ok(false)
    }

    async fn try_point_count(&self) -> Result<u32, TransportError> {
        let count = lock_canvas(&self.canvas).point_count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    // Pointer events drive the canvas directly
    async fn start_capture(&self, _message: Option<&str>) -> Result<(), TransportError> {
        Ok(())
    }

    async fn stop_capture(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn clear_signature(&self) -> Result<(), TransportError> {
        lock_canvas(&self.canvas).clear();
        Ok(())
    }

    async fn reset_tablet(&self) -> Result<(), TransportError> {
        self.clear_signature().await
    }

    async fn svg_path(&self, width: f64, height: f64) -> Result<String, TransportError> {
        Ok(lock_canvas(&self.canvas).svg_path(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padsign_ink::decode;

    #[tokio::test]
    async fn test_canvas_transport_reads_shared_capturer() {
        let canvas = shared_canvas(CanvasConfig::default());
        let transport = CanvasTransport::new(canvas.clone());

        let probe = transport.probe().await;
        assert!(probe.available);
        assert!(!probe.tablet_connected);
        assert_eq!(transport.point_count().await, 0);
        assert_eq!(transport.svg_path(400.0, 120.0).await.unwrap(), "");

        {
            let mut capturer = lock_canvas(&canvas);
            capturer.pointer_down(10.0, 10.0, None);
            capturer.pointer_move(40.0, 30.0, None);
            capturer.pointer_move(80.0, 20.0, None);
            capturer.pointer_up();
        }

        assert_eq!(transport.point_count().await, 3);
        let path = transport.svg_path(400.0, 120.0).await.unwrap();
        assert_eq!(decode(&path).len(), 1);

        transport.clear_signature().await.unwrap();
        assert_eq!(transport.point_count().await, 0);
        assert!(!transport.tablet_state().await);
    }
}
