//! Client error types.

use thiserror::Error;

/// Errors surfaced by client operations that have a caller to report to.
///
/// Connection failures are not in here: they are recovered by the retry loop
/// and only ever show up in logs and in [`crate::ws::PresenceView`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured endpoint does not form a valid URL.
    #[error("invalid realtime endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// An identity was required but is empty.
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// An outbound payload could not be serialised.
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The manager is gone, or the connection the handle refers to is.
    #[error("connection closed")]
    ConnectionClosed,

    /// The transport refused a frame.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors reading [`crate::config::ClientConfig`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be an unsigned integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} has no host")]
    MissingHost { var: &'static str },
}
