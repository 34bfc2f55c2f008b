//! Error types for ghapp-tools.

use thiserror::Error;

/// Main error type for ghapp operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Base URL could not be parsed
    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: BaseUrlError,
    },

    /// App private key could not be parsed or used for signing
    #[error("Credential error: {0}")]
    Credentials(#[from] jsonwebtoken::errors::Error),

    /// 401 from the API
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 403 from the API
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404 from the API
    #[error("Not found: {0}")]
    NotFound(String),

    /// API returned an error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// GraphQL query returned errors
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Response body could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an error from a non-success HTTP status and response body.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Error::Unauthorized(message),
            403 => Error::Forbidden(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }

    /// Build an [`Error::InvalidBaseUrl`] for `url`.
    pub fn invalid_base_url(url: impl Into<String>, source: impl Into<BaseUrlError>) -> Self {
        Error::InvalidBaseUrl {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Reason a base URL was rejected.
#[derive(Error, Debug)]
pub enum BaseUrlError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),

    /// `Url::parse` strips tabs and newlines instead of failing on them
    #[error("invalid control character {ch:?} at byte {index}")]
    ControlCharacter { ch: char, index: usize },
}

/// Fail if `url` contains an ASCII control character.
pub fn reject_control_characters(url: &str) -> Result<()> {
    match url.char_indices().find(|(_, c)| c.is_ascii_control()) {
        Some((index, ch)) => Err(Error::invalid_base_url(
            url,
            BaseUrlError::ControlCharacter { ch, index },
        )),
        None => Ok(()),
    }
}

/// Result type alias for ghapp operations.
pub type Result<T> = std::result::Result<T, Error>;
