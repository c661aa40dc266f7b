//! Bridge wire format errors

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Outbound request or response could not be written as JSON
    #[error("Bridge message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Inbound text frame that does not parse as the expected message
    #[error("Malformed bridge frame: {0}")]
    MalformedFrame(String),
}
