//! Shared data model for padsign
//!
//! Defines the signature point/stroke model, connection and capture state
//! reported to the UI layer, and the JSON messages exchanged with the legacy
//! signature bridge over WebSocket.

pub mod commands;
pub mod error;
pub mod messages;
pub mod types;

pub use commands::*;
pub use error::*;
pub use messages::*;
pub use types::*;
