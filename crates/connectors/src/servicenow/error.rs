use crate::http::TransportError;
use model::pagination::window::WindowError;
use thiserror::Error;

/// Errors from the OAuth token exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint refused the credentials. Never retried.
    #[error("Authentication rejected (HTTP {status}): {error}: {description}")]
    Rejected {
        status: u16,
        error: String,
        description: String,
    },

    /// The token endpoint answered with a server-side or throttling status.
    #[error("Token endpoint unavailable (HTTP {status}): {body}")]
    Unavailable { status: u16, body: String },

    #[error("Token endpoint unreachable: {0}")]
    Transport(#[from] TransportError),

    /// A success status without a usable token.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Token acquisition failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<AuthError>,
    },
}

impl AuthError {
    /// Only transport-class failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transport(_) | AuthError::Unavailable { .. })
    }
}

/// Errors from reading table pages.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service gave up early (execution-time budget) or the transport failed.
    #[error("Retryable fetch failure on '{table}' at offset {offset}: {message}")]
    Retryable {
        table: String,
        offset: usize,
        message: String,
    },

    #[error("Fetch failed on '{table}' at offset {offset} (HTTP {status}): {detail}")]
    NonRetryable {
        table: String,
        offset: usize,
        status: u16,
        detail: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid fetch window: {0}")]
    InvalidWindow(#[from] WindowError),

    /// Terminal I/O failure naming the offset range that was never read.
    #[error(
        "I/O failure: rows [{start}, {end}) of '{table}' could not be read after {attempts} attempts: {last}"
    )]
    Exhausted {
        table: String,
        start: usize,
        end: usize,
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Retryable { .. })
    }
}

/// Errors turning a record into a write sub-request.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Update on '{table}' requires the '{field}' field")]
    MissingIdentifier { table: String, field: String },

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to decode request body: {0}")]
    Decode(String),
}

/// Why a batch call was aborted on a per-record outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    PermissionDenied,
    Unrecognized,
}

/// Errors from the batched write protocol.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Transport failure or non-success batch response; the call may be retried.
    #[error("Retryable batch failure ({batch_id}): {message}")]
    Retryable { batch_id: String, message: String },

    /// A sub-request failed in a way that aborts the whole call.
    #[error("Batch write to '{table}' aborted by request {request_id} (HTTP {status}): {detail}")]
    Terminal {
        table: String,
        request_id: String,
        status: u16,
        kind: TerminalKind,
        detail: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Duplicate request id in batch: {0}")]
    DuplicateRequestId(String),

    #[error("Invalid batch response ({batch_id}): {message}")]
    InvalidResponse { batch_id: String, message: String },

    #[error("Batch write to '{table}' still had {pending} pending requests after {rounds} rounds")]
    RoundsExhausted {
        table: String,
        rounds: usize,
        pending: usize,
    },

    #[error("Batch write to '{table}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        table: String,
        attempts: usize,
        #[source]
        last: Box<BatchError>,
    },
}

impl BatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BatchError::Retryable { .. })
    }
}
