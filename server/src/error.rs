//! Error types for the FAQBot server.

use faqbot_match::{ErrorKind, MatchError, RebuildFailure};
use serde_json::json;
use thiserror::Error;

use crate::rpc::protocol::JsonRpcError;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Rebuild(#[from] RebuildFailure),

    #[error("Match engine error: {0}")]
    Match(#[from] MatchError),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServerError> for JsonRpcError {
    fn from(err: ServerError) -> Self {
        match &err {
            ServerError::Rebuild(failure) => {
                let data = json!({
                    "stage": failure.stage,
                    "kind": failure.kind(),
                    "message": failure.source.to_string(),
                });
                let error = if failure.kind() == ErrorKind::RebuildInProgress {
                    JsonRpcError::rebuild_in_progress(err.to_string())
                } else {
                    JsonRpcError::rebuild_failed(err.to_string())
                };
                error.with_data(data)
            }
            ServerError::InvalidParams(msg) => JsonRpcError::invalid_params(msg.clone()),
            _ => JsonRpcError::internal_error(err.to_string()),
        }
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
