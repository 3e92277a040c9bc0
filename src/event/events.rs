use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use super::handler::EventError;

/// The closed set of things the forum tells live clients about.
///
/// The snake_case name doubles as the `event` discriminator on the wire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    NicknameUpdated,
    ThreadCreated,
    MessageCreated,
    StatsUpdated,
}

/// A user changed their nickname
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicknameUpdated {
    pub user_id: u64,
    pub nickname: String,
    pub timestamp: i64,
}

/// A thread was created on a board
///
/// `fields` echoes the stored thread record (title, content, author, ...)
/// and never contains the identifying keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadCreated {
    pub thread_id: u64,
    pub board_id: u64,
    pub timestamp: i64,
    pub fields: Map<String, Value>,
}

/// A message was posted into a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreated {
    pub message_id: u64,
    pub thread_id: u64,
    pub timestamp: i64,
    pub fields: Map<String, Value>,
}

/// Aggregate statistics were recomputed; `data` is passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsUpdated {
    pub data: Value,
    pub timestamp: i64,
}

/// Facts produced by the forum's services after their own writes succeeded.
///
/// Events are immutable once published and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    NicknameUpdated(NicknameUpdated),
    ThreadCreated(ThreadCreated),
    MessageCreated(MessageCreated),
    StatsUpdated(StatsUpdated),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::NicknameUpdated(_) => EventKind::NicknameUpdated,
            DomainEvent::ThreadCreated(_) => EventKind::ThreadCreated,
            DomainEvent::MessageCreated(_) => EventKind::MessageCreated,
            DomainEvent::StatsUpdated(_) => EventKind::StatsUpdated,
        }
    }

    pub fn nickname_updated(user_id: u64, nickname: impl Into<String>) -> Self {
        DomainEvent::NicknameUpdated(NicknameUpdated {
            user_id,
            nickname: nickname.into(),
            timestamp: Utc::now().timestamp(),
        })
    }

    pub fn thread_created(thread_id: u64, board_id: u64, fields: Map<String, Value>) -> Self {
        DomainEvent::ThreadCreated(ThreadCreated {
            thread_id,
            board_id,
            timestamp: Utc::now().timestamp(),
            fields: strip_reserved(fields, &["thread_id", "board_id"]),
        })
    }

    pub fn message_created(message_id: u64, thread_id: u64, fields: Map<String, Value>) -> Self {
        DomainEvent::MessageCreated(MessageCreated {
            message_id,
            thread_id,
            timestamp: Utc::now().timestamp(),
            fields: strip_reserved(fields, &["message_id", "thread_id"]),
        })
    }

    pub fn stats_updated(data: Value) -> Self {
        DomainEvent::StatsUpdated(StatsUpdated {
            data,
            timestamp: Utc::now().timestamp(),
        })
    }

    /// Builds an event from an untyped `(kind, payload)` pair.
    ///
    /// Unknown kinds and payloads missing an identifying field are rejected;
    /// every other key of an object payload is kept as an echoed field.
    pub fn from_parts(kind: &str, payload: Value) -> Result<Self, EventError> {
        let kind =
            EventKind::from_str(kind).map_err(|_| EventError::UnknownKind(kind.to_string()))?;

        if kind == EventKind::StatsUpdated {
            return Ok(DomainEvent::stats_updated(payload));
        }

        let Value::Object(mut object) = payload else {
            return Err(EventError::InvalidPayload {
                kind,
                reason: "payload is not an object".to_string(),
            });
        };

        let event = match kind {
            EventKind::NicknameUpdated => {
                let user_id = take_u64(&mut object, kind, "user_id")?;
                let nickname = match object.remove("nickname") {
                    Some(Value::String(nickname)) => nickname,
                    _ => String::new(),
                };
                let timestamp = take_timestamp(&mut object, kind)
                    .unwrap_or_else(|_| Utc::now().timestamp());
                DomainEvent::NicknameUpdated(NicknameUpdated {
                    user_id,
                    nickname,
                    timestamp,
                })
            }
            EventKind::ThreadCreated => {
                let timestamp = take_timestamp(&mut object, kind)?;
                let thread_id = take_u64(&mut object, kind, "thread_id")?;
                let board_id = take_u64(&mut object, kind, "board_id")?;
                DomainEvent::ThreadCreated(ThreadCreated {
                    thread_id,
                    board_id,
                    timestamp,
                    fields: strip_reserved(object, &[]),
                })
            }
            EventKind::MessageCreated => {
                let timestamp = take_timestamp(&mut object, kind)?;
                let message_id = take_u64(&mut object, kind, "message_id")?;
                let thread_id = take_u64(&mut object, kind, "thread_id")?;
                DomainEvent::MessageCreated(MessageCreated {
                    message_id,
                    thread_id,
                    timestamp,
                    fields: strip_reserved(object, &[]),
                })
            }
            EventKind::StatsUpdated => DomainEvent::stats_updated(Value::Object(object)),
        };

        Ok(event)
    }
}

/// Drops keys that would collide with the identifying fields on the wire.
fn strip_reserved(mut fields: Map<String, Value>, identifying: &[&str]) -> Map<String, Value> {
    fields.remove("event");
    fields.remove("timestamp");
    for key in identifying {
        fields.remove(*key);
    }
    fields
}

fn take_u64(
    object: &mut Map<String, Value>,
    kind: EventKind,
    field: &'static str,
) -> Result<u64, EventError> {
    let value = object
        .remove(field)
        .ok_or(EventError::MissingField { kind, field })?;

    as_u64(&value).ok_or_else(|| EventError::InvalidPayload {
        kind,
        reason: format!("{} is not a non-negative integer: {}", field, value),
    })
}

fn take_timestamp(object: &mut Map<String, Value>, kind: EventKind) -> Result<i64, EventError> {
    let value = object.remove("timestamp").ok_or(EventError::MissingField {
        kind,
        field: "timestamp",
    })?;

    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| EventError::InvalidPayload {
            kind,
            reason: format!("timestamp is not an integer: {}", value),
        })
}

// Producers built on loosely typed JSON sometimes hand ids over as floats.
fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}
