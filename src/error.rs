//! Error types for lyria-studio.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
///
/// One variant per failure class. A failed operation never leaves partial
/// state behind: the caller's track and candidate survive unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network/session error talking to the generative backend.
    /// Not retried internally; no partial buffer is ever returned.
    #[error("transport: {0}")]
    Transport(String),

    /// Missing/invalid credentials or request parameters.
    /// Raised before any session is opened.
    #[error("config: {0}")]
    Config(String),

    /// Invalid region bounds or blend failure.
    #[error("splice: {0}")]
    Splice(String),

    /// Could not produce a valid output container. A partial file is
    /// removed rather than left behind looking finalized.
    #[error("persistence: {0}")]
    Persistence(String),

    /// Invalid state transition, stale-region reuse, or a command issued
    /// while a generation is in flight.
    #[error("session: {0}")]
    Session(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        Error::Persistence(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(error.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(error: base64::DecodeError) -> Self {
        Error::Transport(format!("malformed audio chunk: {error}"))
    }
}
