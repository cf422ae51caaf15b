//! Error types for the assessment engine

use thiserror::Error;

/// Failure reported by an inventory or credential provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport or non-success HTTP status
    #[error("provider request failed: {0}")]
    Http(String),

    /// Requested resource does not exist
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Token acquisition or authorization failed
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The provider cannot serve this resource kind
    #[error("unsupported resource type: {0}")]
    Unsupported(String),
}

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure that escapes a control, or one resource inspection within it.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Resource properties could not be decoded into the expected shape
    #[error("malformed {resource_type} '{name}': {message}")]
    Malformed {
        /// ARM type of the resource
        resource_type: String,
        /// Resource name
        name: String,
        /// Decoder message
        message: String,
    },

    /// Required configuration is missing for this control
    #[error("config error: {0}")]
    Config(String),
}

/// Top-level scan failure. Everything else is reported inside the results.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Mandatory scan context is absent
    #[error("missing required scan context: {0}")]
    MissingContext(&'static str),

    /// Provider could not be built for this subscription
    #[error("failed to connect inventory: {0}")]
    Connect(#[source] ProviderError),

    /// Report could not be rendered or stored. Logged by the service; the scan still completes.
    #[error("report error: {0}")]
    Report(String),
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown value for an enumerated setting
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
