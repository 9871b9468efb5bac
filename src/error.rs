//! Error types for the searchmux application layer.

/// Top-level error type for settings loading and soak runs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from the search core (invalid query, bad search config).
    #[error(transparent)]
    Search(#[from] searchmux_core::SearchError),

    /// Settings file could not be parsed or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Soak run could not complete.
    #[error("soak error: {0}")]
    Soak(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
