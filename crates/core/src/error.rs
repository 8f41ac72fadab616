//! Error types for the practice valuation system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the practice valuation system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed dataset (invalid records, empty table).
    #[error("Data error: {0}")]
    Data(String),

    /// No benchmark snapshot has been published yet.
    #[error("Benchmarks unavailable: no snapshot has been published")]
    BenchmarkUnavailable,

    /// Dataset source could not be read (database, missing table).
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a dataset source error.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Error::Dataset(msg.into())
    }

    /// Whether the error means the service has nothing to serve yet.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::BenchmarkUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_kind() {
        assert!(Error::BenchmarkUnavailable.is_unavailable());
        assert!(!Error::data("bad row").is_unavailable());
    }

    #[test]
    fn test_display() {
        let err = Error::data("row 3: unknown province 'ZZ'");
        assert_eq!(err.to_string(), "Data error: row 3: unknown province 'ZZ'");
    }
}
