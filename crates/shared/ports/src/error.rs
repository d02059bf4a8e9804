use thiserror::Error;

/// Errors raised by a shared-store backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by an exchange connector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The exchange refused the request or could not be reached
    #[error("Exchange request failed: {0}")]
    Request(String),

    /// The exchange answered but the answer could not be interpreted
    #[error("Unparseable exchange response: {0}")]
    UnparseableResponse(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Trading disabled")]
    TradingDisabled,
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;
