//! Error types for the COA protocol

use thiserror::Error;

/// Errors raised while encoding or decoding protocol payloads
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON in body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid base64 in body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid UTF-8 in body: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Content type {content_type} cannot carry a {kind} body")]
    UnsupportedBody {
        content_type: String,
        kind: &'static str,
    },
}
