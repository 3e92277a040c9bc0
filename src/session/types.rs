use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who is behind a session key, as resolved at handshake time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionIdentity {
    pub user_id: u64,
    pub session_id: u64,
    pub session_key: String,
    pub nickname: String,
    pub last_nickname_change: Option<DateTime<Utc>>,
}
