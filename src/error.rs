use std::io;

/// Result alias used by cookie and session storage operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while persisting or loading sessions.
///
/// Parsing a cookie never produces one of these: unreadable or unverifiable cookies are
/// reported as absent values instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to encode value: {0}")]
    Encode(String),

    #[error("failed to decode stored session: {0}")]
    Decode(String),

    #[error("cookie length will exceed browser maximum ({size} > {max} bytes)")]
    CookieTooLarge { size: usize, max: usize },

    #[error("session backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Wraps any displayable backend failure, e.g. from a key-value or table client.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Errors raised by upload handlers.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("field \"{field}\" exceeded upload size of {max} bytes")]
    MaxPartSizeExceeded { field: String, max: u64 },

    #[error("field \"{field}\" is not valid UTF-8 text")]
    InvalidText { field: String },

    #[error("upload stream failed: {0}")]
    Stream(io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
