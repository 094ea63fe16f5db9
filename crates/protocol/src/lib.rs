//! Shared protocol types for promptdock
//!
//! Defines the `postMessage` bridge envelopes exchanged between frames, the
//! command messages sent by the extension host, and the text normalization
//! used when building page snapshots.

pub mod bridge;
pub mod command;
pub mod text;

pub use bridge::*;
pub use command::*;

/// Errors raised while decoding protocol messages
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("bridge marker must be the literal `true`")]
    MissingMarker,
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
