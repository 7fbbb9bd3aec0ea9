use crate::{
    http::TransportError,
    servicenow::error::{AuthError, BatchError, FetchError, SchemaError},
};
use thiserror::Error;

/// Any failure surfaced by the service connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Batch write error: {0}")]
    Batch(#[from] BatchError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ConnectorError {
    /// True when the same operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Auth(err) => err.is_transient(),
            ConnectorError::Fetch(err) => err.is_retryable(),
            ConnectorError::Batch(err) => err.is_retryable(),
            ConnectorError::Schema(_) => false,
            ConnectorError::Transport(_) => true,
        }
    }
}
