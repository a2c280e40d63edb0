//! Protocol-level error types

use thiserror::Error;

use crate::payload::Opcode;

/// Errors produced while encoding or decoding gateway payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid payload JSON: {0}")]
    Json(String),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("received a binary frame on a plain-text connection")]
    UnexpectedBinaryFrame,

    #[error("received a text frame on a zlib-stream connection")]
    UnexpectedTextFrame,

    #[error("expected hello as the first payload, received opcode {0:?}")]
    MissingHello(Opcode),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for ProtocolError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        ProtocolError::Utf8(e.to_string())
    }
}

/// Result type for protocol-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
