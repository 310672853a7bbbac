use thiserror::Error;

/// profitbook error types
#[derive(Error, Debug)]
pub enum ProfitbookError {
    /// Failed to parse a document or value
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Tabular store operation failed (missing sheet, missing column)
    #[error("store error: {0}")]
    Store(String),

    /// Exchange rate fetch failed
    #[error("rate error: {0}")]
    Rate(String),

    /// Notification dispatch failed
    #[error("notify error: {0}")]
    Notify(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for profitbook
pub type Result<T> = std::result::Result<T, ProfitbookError>;
