//! Realtime channel protocol definitions.
//!
//! Every frame is a UTF-8 JSON object with a required `type` string. Payload
//! fields sit next to `type` at the top level:
//!
//! ```json
//! {"type":"ONLINE_USERS","users":["u1","u42"]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// Close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket went away without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Query parameter carrying the identity on the connect URL.
pub const USER_ID_PARAM: &str = "userId";

/// Tag of the presence snapshot message.
pub const ONLINE_USERS: &str = "ONLINE_USERS";

/// Payload of an `ONLINE_USERS` snapshot.
///
/// Ordering and uniqueness of `users` are not guaranteed by the peer; treat
/// it as a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsers {
    pub users: Vec<String>,
}

/// A typed inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Authoritative snapshot of who is online.
    OnlineUsers(OnlineUsers),
    /// A well-formed frame whose `type` this client does not handle.
    Unknown { kind: String },
}

impl InboundMessage {
    /// Decode a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw).map_err(ProtocolError::Malformed)?;

        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => return Err(ProtocolError::MissingType),
        };

        match kind.as_str() {
            ONLINE_USERS => serde_json::from_value::<OnlineUsers>(value)
                .map(InboundMessage::OnlineUsers)
                .map_err(|source| ProtocolError::InvalidPayload { kind, source }),
            _ => Ok(InboundMessage::Unknown { kind }),
        }
    }

    /// The `type` tag this message was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::OnlineUsers(_) => ONLINE_USERS,
            InboundMessage::Unknown { kind } => kind,
        }
    }
}

/// Returns true if `code` is the normal closure code.
pub fn is_normal_closure(code: u16) -> bool {
    code == NORMAL_CLOSURE
}
