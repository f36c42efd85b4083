//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, decoding or resolving endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed or contextually invalid endpoint string.
    #[error("endpoint parse error: {0}")]
    Parse(String),
    /// The host resolved to no usable address.
    #[error("host not found: `{host}'")]
    HostNotFound { host: String },
    /// Address lookup failed for a reason other than an empty answer.
    #[error("failed to resolve `{host}': {reason}")]
    Resolution { host: String, reason: String },
    /// A wire endpoint carries a type code with no registered factory.
    #[error("unknown transport type {type_code}")]
    UnknownTransport { type_code: i16 },
    /// The wire buffer is truncated or malformed.
    #[error("decode error: {0}")]
    Decode(String),
    /// An in-flight resolution was abandoned by its caller.
    #[error("operation cancelled")]
    Cancelled,
    /// Invalid network configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// True for errors a proxy decoder may skip instead of aborting.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::UnknownTransport { .. })
    }
}
