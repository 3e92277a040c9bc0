use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-to-client messages
///
/// Each is a flat JSON object discriminated by `event` and stamped with a unix
/// `timestamp`; thread and message events carry the echoed record fields
/// next to their ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundMessage {
    NicknameUpdated {
        user_id: u64,
        nickname: String,
        timestamp: i64,
    },
    ThreadCreated {
        thread_id: u64,
        board_id: u64,
        timestamp: i64,
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    MessageCreated {
        message_id: u64,
        thread_id: u64,
        timestamp: i64,
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    StatsUpdated {
        data: Value,
        timestamp: i64,
    },
}

impl OutboundMessage {
    /// Serializes to the text frame sent over the socket
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
