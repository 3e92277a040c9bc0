use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `sessions` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionModel {
    pub id: u64,
    pub session_key: String, // Opaque token handed to the browser
    pub user_id: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>, // Set when the last live connection goes away
    pub user_agent: Option<String>,
}

impl SessionModel {
    /// Creates an open session that started now
    pub fn new(id: u64, session_key: impl Into<String>, user_id: u64) -> Self {
        Self {
            id,
            session_key: session_key.into(),
            user_id,
            started_at: Utc::now(),
            ended_at: None,
            user_agent: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Row of the `users` table, limited to what live connections need
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserModel {
    pub id: u64,
    pub nickname: String,
    pub last_nickname_change: Option<DateTime<Utc>>,
}

impl UserModel {
    pub fn new(id: u64, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            last_nickname_change: None,
        }
    }

    /// Marks the nickname as changed at `at`
    pub fn with_nickname_change(mut self, at: DateTime<Utc>) -> Self {
        self.last_nickname_change = Some(at);
        self
    }
}
