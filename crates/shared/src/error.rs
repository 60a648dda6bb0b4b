//! Protocol-level error taxonomy.

use thiserror::Error;

/// Why an inbound frame could not be turned into an [`crate::InboundMessage`].
///
/// None of these are fatal to the connection; the offending frame is logged
/// and discarded by the receiver.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame is JSON but has no string `type` field.
    #[error("unstructured message: missing `type` field")]
    MissingType,

    /// The `type` is known but its payload does not match.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// Short machine-readable label, used as a structured log field.
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "malformed",
            ProtocolError::MissingType => "unstructured",
            ProtocolError::InvalidPayload { .. } => "invalid_payload",
        }
    }
}
