//! Vendor local web service client
//!
//! The service listens on a secure and a plain port on localhost and exposes
//! each pad operation as `GET /<service>/<Operation>`. Reads return plain-text
//! bodies; writes pass their arguments as `?v=<comma separated values>`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use padsign_config::{CaptureConfig, LocalServiceConfig};
use padsign_ink::sig_string_to_svg_path;
use padsign_ipc::{ConnectionType, ProbeResult};
use tracing::{debug, info, warn};

use crate::{LCD_HEIGHT, LCD_WIDTH, SignatureTransport, TransportError, parse_numeric_body};

/// LCD capture mode: prompt text may be drawn, ink echoes on the screen
const LCD_CAPTURE_MODE_INK: u8 = 2;

/// LCD capture mode: screen cleared, no ink echo
const LCD_CAPTURE_MODE_CLEAR: u8 = 1;

pub struct LocalServiceClient {
    config: LocalServiceConfig,
    /// Short-timeout client used while detecting
    probe_http: reqwest::Client,
    /// Client for commands once an endpoint is known
    http: reqwest::Client,
    /// Base URL of the first endpoint that answered, owned by this instance
    endpoint: Mutex<Option<String>>,
}

impl LocalServiceClient {
    pub fn new(config: &CaptureConfig) -> Result<Self, TransportError> {
        Self::with_timeouts(
            config.local_service.clone(),
            config.probe_timeout(),
            config.local_service.request_timeout(),
        )
    }

    pub fn with_timeouts(
        config: LocalServiceConfig,
        probe_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        // The service ships a self-signed localhost certificate
        let probe_http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(probe_timeout)
            .build()?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            config,
            probe_http,
            http,
            endpoint: Mutex::new(None),
        })
    }

    /// Base URL currently in use, if detection succeeded
    pub fn active_endpoint(&self) -> Option<String> {
        self.endpoint
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_endpoint(&self, base: Option<String>) {
        *self.endpoint.lock().unwrap_or_else(|e| e.into_inner()) = base;
    }

    async fn base(&self) -> Result<String, TransportError> {
        if let Some(base) = self.active_endpoint() {
            return Ok(base);
        }
        let probe = self.probe().await;
        if !probe.available {
            return Err(TransportError::Unavailable(
                probe.error.unwrap_or_else(|| "local service not reachable".into()),
            ));
        }
        self.active_endpoint()
            .ok_or_else(|| TransportError::Unavailable("local service not reachable".into()))
    }

    async fn get(
        &self,
        client: &reqwest::Client,
        base: &str,
        operation: &str,
        args: Option<&str>,
    ) -> Result<String, TransportError> {
        let url = format!("{base}/{operation}");
        let mut request = client.get(&url);
        if let Some(args) = args {
            request = request.query(&[("v", args)]);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Read an operation's current value
    async fn read(&self, operation: &str) -> Result<String, TransportError> {
        let base = self.base().await?;
        self.get(&self.http, &base, operation, None).await
    }

    /// Invoke an operation with arguments
    async fn write(&self, operation: &str, args: &str) -> Result<String, TransportError> {
        let base = self.base().await?;
        self.get(&self.http, &base, operation, Some(args)).await
    }

    async fn read_number(&self, operation: &str) -> Result<i64, TransportError> {
        parse_numeric_body(&self.read(operation).await?)
    }

    pub async fn model_number(&self) -> Result<String, TransportError> {
        Ok(self.read("TabletModelNumber").await?.trim().to_string())
    }

    pub async fn lcd_capture_mode(&self) -> Result<i64, TransportError> {
        self.read_number("GetLCDCaptureMode").await
    }

    pub async fn lcd_write_string(
        &self,
        x: u32,
        y: u32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.write("LCDWriteString", &format!("0,2,{x},{y},{text}"))
            .await
            .map(|_| ())
    }

    async fn try_show_prompt(&self, message: &str) -> Result<(), TransportError> {
        self.write("SetLCDCaptureMode", &LCD_CAPTURE_MODE_INK.to_string())
            .await?;
        self.lcd_write_string(0, 0, message).await
    }

    async fn try_clear_display(&self) -> Result<(), TransportError> {
        self.write("ClearSigWindow", "1").await?;
        self.write("SetLCDCaptureMode", &LCD_CAPTURE_MODE_CLEAR.to_string())
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SignatureTransport for LocalServiceClient {
    fn kind(&self) -> ConnectionType {
        ConnectionType::LocalService
    }

    async fn probe(&self) -> ProbeResult {
        if !self.config.enabled {
            return ProbeResult::unavailable("local service disabled");
        }

        let mut last_error = None;
        for base in [self.config.secure_base(), self.config.plain_base()] {
            match self.get(&self.probe_http, &base, "TabletState", None).await {
                Ok(body) => {
                    let tablet_connected = parse_numeric_body(&body).map(|v| v == 1).unwrap_or(false);
                    info!("Local signature service found at {}", base);
                    self.set_endpoint(Some(base));

                    let model = match self.model_number().await {
                        Ok(model) if !model.is_empty() && model != "0" => Some(model),
                        Ok(_) => None,
                        Err(e) => {
                            debug!("TabletModelNumber failed: {}", e);
                            None
                        }
                    };
                    return ProbeResult::available(tablet_connected, model);
                }
                Err(e) => {
                    debug!("Local service probe of {} failed: {}", base, e);
                    last_error = Some(format!("{base}: {e}"));
                }
            }
        }

        self.set_endpoint(None);
        ProbeResult::unavailable(
            last_error.unwrap_or_else(|| "local service did not respond".into()),
        )
    }

    async fn try_tablet_state(&self) -> Result<bool, TransportError> {
        Ok(self.read_number("TabletState").await? == 1)
    }

    async fn try_point_count(&self) -> Result<u32, TransportError> {
        Ok(self.read_number("GetNumPoints").await?.max(0) as u32)
    }

    async fn start_capture(&self, message: Option<&str>) -> Result<(), TransportError> {
        self.write("ClearTablet", "1").await?;
        self.write("SetSigWindow", &format!("1,0,0,{LCD_WIDTH},{LCD_HEIGHT}"))
            .await?;
        self.write("TabletState", "1").await?;
        if let Some(message) = message {
            self.show_prompt(message).await;
        }
        Ok(())
    }

    async fn stop_capture(&self) -> Result<(), TransportError> {
        self.write("TabletState", "0").await.map(|_| ())
    }

    async fn clear_signature(&self) -> Result<(), TransportError> {
        self.write("ClearTablet", "1").await.map(|_| ())
    }

    async fn reset_tablet(&self) -> Result<(), TransportError> {
        self.write("Reset", "1").await.map(|_| ())
    }

    async fn svg_path(&self, width: f64, height: f64) -> Result<String, TransportError> {
        let raw = self.read("GetSigString").await?;
        Ok(sig_string_to_svg_path(&raw, width, height))
    }

    async fn show_prompt(&self, message: &str) {
        if let Err(e) = self.try_show_prompt(message).await {
            warn!("LCD prompt failed (ignored): {}", e);
        }
    }

    async fn clear_display(&self) {
        if let Err(e) = self.try_clear_display().await {
            warn!("LCD clear failed (ignored): {}", e);
        }
    }

    async fn disconnect(&self) {
        self.set_endpoint(None);
    }
}
