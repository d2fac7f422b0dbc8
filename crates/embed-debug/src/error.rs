//! Debugger errors.

use std::io;

use thiserror::Error;

/// Errors that end a debug session.
///
/// None of these reach the host program: every variant detaches the session
/// and execution continues undebugged.
#[derive(Debug, Error)]
pub enum DebugError {
    /// Read or write on the transport failed.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// The peer closed the connection (zero-length read or write).
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A frame payload was not valid JSON for the expected envelope.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// A message decoded but had an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame length prefix exceeded the configured maximum.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// A variables reference decoded to a frame or scope that does not exist.
    #[error("invalid variables reference {reference} (stack depth {stack_depth})")]
    InvalidReference { reference: u32, stack_depth: u32 },

    /// The attach address could not be parsed.
    #[error("invalid debug address '{0}'")]
    InvalidAddress(String),
}

impl DebugError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DebugError>;
