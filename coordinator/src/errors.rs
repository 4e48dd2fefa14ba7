//! Error types for the COA coordinator

use coa_protocol::errors::ProtocolError;
use coa_protocol::state::ResultCode;
use coa_protocol::summary::SummaryState;
use thiserror::Error;

/// Main error type for the coordinator
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),

    #[error("Summary not found: {0}")]
    SummaryNotFound(String),

    #[error("Summary {0} is already finished")]
    SummaryFinished(String),

    #[error("Invalid transition for summary {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: SummaryState,
        to: SummaryState,
    },

    #[error("Stale job id for summary {id}: {incoming} is older than {current}")]
    StaleJobId {
        id: String,
        incoming: i64,
        current: i64,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("MQTT error: {0}")]
    MqttError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Result code reported to the caller of a failed request
    pub fn result_code(&self) -> ResultCode {
        match self {
            CoordinatorError::SummaryNotFound(_) => ResultCode::NOT_FOUND,
            CoordinatorError::SummaryFinished(_)
            | CoordinatorError::InvalidTransition { .. }
            | CoordinatorError::StaleJobId { .. } => ResultCode::CONFLICT,
            CoordinatorError::BadRequest(_) | CoordinatorError::ProtocolError(_) => {
                ResultCode::BAD_REQUEST
            }
            _ => ResultCode::INTERNAL_ERROR,
        }
    }
}

impl From<anyhow::Error> for CoordinatorError {
    fn from(err: anyhow::Error) -> Self {
        CoordinatorError::Internal(err.to_string())
    }
}
