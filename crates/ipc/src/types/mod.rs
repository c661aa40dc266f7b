//! Type definitions shared by the codec, transports and controller.

mod connection;
mod point;
mod snapshot;

pub use connection::*;
pub use point::*;
pub use snapshot::*;
