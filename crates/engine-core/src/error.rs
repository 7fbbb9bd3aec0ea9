use connectors::{
    error::ConnectorError,
    http::TransportError,
    servicenow::error::{BatchError, FetchError, SchemaError},
};
use engine_config::settings::error::SettingsError;
use model::pagination::window::WindowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid read window: {0}")]
    Window(#[from] WindowError),

    /// The writer was used after a terminal failure discarded its state.
    #[error("Writer for '{0}' was aborted by an earlier failure")]
    WriterAborted(String),
}

impl From<FetchError> for EngineError {
    fn from(err: FetchError) -> Self {
        EngineError::Connector(err.into())
    }
}

impl From<BatchError> for EngineError {
    fn from(err: BatchError) -> Self {
        EngineError::Connector(err.into())
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        EngineError::Connector(err.into())
    }
}

impl From<TransportError> for EngineError {
    fn from(err: TransportError) -> Self {
        EngineError::Connector(err.into())
    }
}
