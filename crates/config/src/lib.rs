//! Shared configuration for padsign
//!
//! This crate is the single source of truth for service ports, timeouts,
//! polling cadence and the logical signature canvas. Values come from
//! [`Default`], optionally a JSON file, then `PADSIGN_*` environment
//! overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical signature canvas width in units
pub const DEFAULT_CANVAS_WIDTH: u32 = 400;

/// Logical signature canvas height in units
pub const DEFAULT_CANVAS_HEIGHT: u32 = 120;

/// Padding kept around the scaled drawing when exporting a path
pub const DEFAULT_PATH_PADDING: f64 = 10.0;

/// Host the vendor service and bridge listen on
pub const DEFAULT_HOST: &str = "localhost";

/// HTTPS port of the vendor local service
pub const DEFAULT_SECURE_PORT: u16 = 47290;

/// Plain HTTP port of the vendor local service
pub const DEFAULT_PLAIN_PORT: u16 = 47289;

/// Path segment the vendor service mounts its operations under
pub const DEFAULT_SERVICE_PATH: &str = "SigWeb";

/// WebSocket port of the legacy bridge process
pub const DEFAULT_BRIDGE_PORT: u16 = 47300;

/// Probe timeout for transport detection
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Round-trip timeout for a single bridge command
pub const DEFAULT_BRIDGE_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Timeout for a single local service command once an endpoint is known
pub const DEFAULT_SERVICE_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Point count polling cadence while capturing
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Tablet connectivity re-check cadence while connected to hardware
pub const DEFAULT_STATE_CHECK_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Vendor local web service endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalServiceConfig {
    pub enabled: bool,
    pub host: String,
    pub secure_port: u16,
    pub plain_port: u16,
    pub service_path: String,
    pub request_timeout_ms: u64,
}

impl Default for LocalServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_HOST.to_string(),
            secure_port: DEFAULT_SECURE_PORT,
            plain_port: DEFAULT_PLAIN_PORT,
            service_path: DEFAULT_SERVICE_PATH.to_string(),
            request_timeout_ms: DEFAULT_SERVICE_REQUEST_TIMEOUT_MS,
        }
    }
}

impl LocalServiceConfig {
    /// Base URL for the secure endpoint, without trailing slash
    pub fn secure_base(&self) -> String {
        format!(
            "https://{}:{}/{}",
            self.host, self.secure_port, self.service_path
        )
    }

    /// Base URL for the plain endpoint, without trailing slash
    pub fn plain_base(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.plain_port, self.service_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Legacy WebSocket bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub request_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_BRIDGE_PORT,
            request_timeout_ms: DEFAULT_BRIDGE_REQUEST_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Logical canvas geometry shared by the codec and the canvas capturer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub padding: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            padding: DEFAULT_PATH_PADDING,
        }
    }
}

impl CanvasConfig {
    pub fn width_f64(&self) -> f64 {
        self.width as f64
    }

    pub fn height_f64(&self) -> f64 {
        self.height as f64
    }
}

/// Top-level capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub local_service: LocalServiceConfig,
    pub bridge: BridgeConfig,
    pub canvas: CanvasConfig,
    /// Probe the local service before the bridge
    pub prefer_local_service: bool,
    /// Fall back to canvas drawing when no pad is reachable
    pub canvas_fallback: bool,
    pub probe_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub state_check_interval_ms: u64,
    /// Consecutive failed polls before the pad is treated as unplugged.
    /// `None` keeps polling silently.
    pub poll_failure_threshold: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            local_service: LocalServiceConfig::default(),
            bridge: BridgeConfig::default(),
            canvas: CanvasConfig::default(),
            prefer_local_service: true,
            canvas_fallback: true,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            state_check_interval_ms: DEFAULT_STATE_CHECK_INTERVAL_MS,
            poll_failure_threshold: None,
        }
    }
}

impl CaptureConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Defaults with `PADSIGN_*` environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PADSIGN_HOST") {
            self.local_service.host = host.clone();
            self.bridge.host = host;
        }
        if let Some(value) = lookup("PADSIGN_SECURE_PORT") {
            self.local_service.secure_port = parse_value("PADSIGN_SECURE_PORT", &value)?;
        }
        if let Some(value) = lookup("PADSIGN_PLAIN_PORT") {
            self.local_service.plain_port = parse_value("PADSIGN_PLAIN_PORT", &value)?;
        }
        if let Some(value) = lookup("PADSIGN_BRIDGE_PORT") {
            self.bridge.port = parse_value("PADSIGN_BRIDGE_PORT", &value)?;
        }
        if let Some(value) = lookup("PADSIGN_PREFER") {
            self.prefer_local_service = match value.as_str() {
                "local" | "sigweb" => true,
                "bridge" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "PADSIGN_PREFER".into(),
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup("PADSIGN_CANVAS_FALLBACK") {
            self.canvas_fallback = parse_flag("PADSIGN_CANVAS_FALLBACK", &value)?;
        }
        if let Some(value) = lookup("PADSIGN_POLL_MS") {
            self.poll_interval_ms = parse_value("PADSIGN_POLL_MS", &value)?;
        }
        if let Some(value) = lookup("PADSIGN_POLL_FAILURE_THRESHOLD") {
            self.poll_failure_threshold = Some(parse_value("PADSIGN_POLL_FAILURE_THRESHOLD", &value)?);
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn state_check_interval(&self) -> Duration {
        Duration::from_millis(self.state_check_interval_ms.max(1))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other if other.eq_ignore_ascii_case("true") => Ok(true),
        other if other.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.canvas.width, DEFAULT_CANVAS_WIDTH);
        assert_eq!(config.canvas.height, DEFAULT_CANVAS_HEIGHT);
        assert!(config.prefer_local_service);
        assert!(config.canvas_fallback);
        assert_eq!(config.poll_failure_threshold, None);
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.bridge.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.local_service.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_service_timeout_is_independent() {
        let config = CaptureConfig::from_json(
            r#"{"local_service": {"request_timeout_ms": 750}, "bridge": {"request_timeout_ms": 9000}}"#,
        )
        .unwrap();
        assert_eq!(config.local_service.request_timeout(), Duration::from_millis(750));
        assert_eq!(config.bridge.request_timeout(), Duration::from_secs(9));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = LocalServiceConfig::default();
        assert_eq!(config.secure_base(), "https://localhost:47290/SigWeb");
        assert_eq!(config.plain_base(), "http://localhost:47289/SigWeb");
        assert_eq!(BridgeConfig::default().url(), "ws://localhost:47300");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            CaptureConfig::from_json(r#"{"poll_interval_ms": 250, "bridge": {"port": 9000}}"#)
                .unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.bridge.port, 9000);
        assert_eq!(config.bridge.host, DEFAULT_HOST);
        assert_eq!(config.local_service.secure_port, DEFAULT_SECURE_PORT);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PADSIGN_HOST", "127.0.0.1"),
            ("PADSIGN_PLAIN_PORT", "8080"),
            ("PADSIGN_PREFER", "bridge"),
            ("PADSIGN_CANVAS_FALLBACK", "false"),
            ("PADSIGN_POLL_FAILURE_THRESHOLD", "20"),
        ]
        .into_iter()
        .collect();

        let mut config = CaptureConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.local_service.host, "127.0.0.1");
        assert_eq!(config.bridge.host, "127.0.0.1");
        assert_eq!(config.local_service.plain_port, 8080);
        assert!(!config.prefer_local_service);
        assert!(!config.canvas_fallback);
        assert_eq!(config.poll_failure_threshold, Some(20));
    }

    #[test]
    fn test_invalid_override() {
        let mut config = CaptureConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "PADSIGN_BRIDGE_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
