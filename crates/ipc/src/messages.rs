//! Request/response envelopes for the legacy bridge WebSocket.

use serde::{Deserialize, Serialize};

use crate::commands::BridgeCommand;
use crate::error::IpcError;

/// Outbound bridge request: `{"id": n, "command": "...", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub id: u64,
    #[serde(flatten)]
    pub command: BridgeCommand,
}

impl BridgeRequest {
    pub fn new(id: u64, command: BridgeCommand) -> Self {
        Self { id, command }
    }

    pub fn to_json(&self) -> Result<String, IpcError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, IpcError> {
        serde_json::from_str(text).map_err(|e| IpcError::MalformedFrame(e.to_string()))
    }
}

/// Inbound bridge response: `{"id": n, "result": ...}` or `{"id": n, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, IpcError> {
        serde_json::from_str(text).map_err(|e| IpcError::MalformedFrame(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, IpcError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Collapse into the remote outcome. A response without `error` is a
    /// success; a missing `result` reads as `null`.
    pub fn into_result(self) -> Result<serde_json::Value, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = BridgeRequest::new(
            7,
            BridgeCommand::LcdWriteString {
                dest: 0,
                mode: 2,
                x: 10,
                y: 5,
                text: "Sign here".into(),
            },
        );
        let value: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["command"], "LCDWriteString");
        assert_eq!(value["params"]["text"], "Sign here");

        let parsed = BridgeRequest::from_json(&request.to_json().unwrap()).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_unit_command_has_no_params() {
        let request = BridgeRequest::new(1, BridgeCommand::TabletState);
        let value: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(value["command"], "TabletState");
        assert_eq!(request.command.name(), "TabletState");
    }

    #[test]
    fn test_response_outcomes() {
        let ok = BridgeResponse::from_json(r#"{"id": 3, "result": 1}"#).unwrap();
        assert_eq!(ok.id, 3);
        assert_eq!(ok.into_result(), Ok(json!(1)));

        let err = BridgeResponse::from_json(r#"{"id": 4, "error": "no tablet"}"#).unwrap();
        assert_eq!(err.into_result(), Err("no tablet".to_string()));

        let bare = BridgeResponse::from_json(r#"{"id": 5}"#).unwrap();
        assert_eq!(bare.into_result(), Ok(serde_json::Value::Null));
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(matches!(
            BridgeResponse::from_json("not json"),
            Err(IpcError::MalformedFrame(_))
        ));
        assert!(matches!(
            BridgeRequest::from_json(r#"{"id": 1, "command": "Explode"}"#),
            Err(IpcError::MalformedFrame(_))
        ));
    }
}
