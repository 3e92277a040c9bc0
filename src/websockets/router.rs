use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::event::DomainEvent;
use crate::session::SessionIdentity;

use super::messages::OutboundMessage;

/// Which live connections a routed message goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRule {
    Broadcast,
    /// Only connections owned by this user
    User(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub message: OutboundMessage,
    pub rule: RecipientRule,
}

/// Maps a domain event to its wire message and recipients
///
/// A nickname change only concerns the user's own open connections; every
/// other kind is broadcast.
pub fn route(event: &DomainEvent) -> RoutedEvent {
    match event {
        DomainEvent::NicknameUpdated(e) => RoutedEvent {
            message: OutboundMessage::NicknameUpdated {
                user_id: e.user_id,
                nickname: e.nickname.clone(),
                timestamp: e.timestamp,
            },
            rule: RecipientRule::User(e.user_id),
        },
        DomainEvent::ThreadCreated(e) => RoutedEvent {
            message: OutboundMessage::ThreadCreated {
                thread_id: e.thread_id,
                board_id: e.board_id,
                timestamp: e.timestamp,
                fields: e.fields.clone(),
            },
            rule: RecipientRule::Broadcast,
        },
        DomainEvent::MessageCreated(e) => RoutedEvent {
            message: OutboundMessage::MessageCreated {
                message_id: e.message_id,
                thread_id: e.thread_id,
                timestamp: e.timestamp,
                fields: e.fields.clone(),
            },
            rule: RecipientRule::Broadcast,
        },
        DomainEvent::StatsUpdated(e) => RoutedEvent {
            message: OutboundMessage::StatsUpdated {
                data: e.data.clone(),
                timestamp: e.timestamp,
            },
            rule: RecipientRule::Broadcast,
        },
    }
}

/// Catch-up message for a freshly connected client whose nickname changed
/// within `cooldown` of `now`
///
/// The message carries the current nickname and the time of the change, so
/// the client can show how long until it may change it again.
pub fn cooldown_notice(
    identity: &SessionIdentity,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<OutboundMessage> {
    let changed_at = identity.last_nickname_change?;
    let cooldown = chrono::Duration::from_std(cooldown).ok()?;

    if now.signed_duration_since(changed_at) >= cooldown {
        return None;
    }

    Some(OutboundMessage::NicknameUpdated {
        user_id: identity.user_id,
        nickname: identity.nickname.clone(),
        timestamp: changed_at.timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{json, Map};

    fn identity(changed_secs_ago: Option<i64>, now: DateTime<Utc>) -> SessionIdentity {
        SessionIdentity {
            user_id: 1,
            session_id: 10,
            session_key: "key-1".to_string(),
            nickname: "Fox".to_string(),
            last_nickname_change: changed_secs_ago.map(|s| now - chrono::Duration::seconds(s)),
        }
    }

    #[rstest]
    #[case::nickname(DomainEvent::nickname_updated(1, "Fox"), RecipientRule::User(1))]
    #[case::thread(DomainEvent::thread_created(3, 2, Map::new()), RecipientRule::Broadcast)]
    #[case::message(DomainEvent::message_created(42, 7, Map::new()), RecipientRule::Broadcast)]
    #[case::stats(DomainEvent::stats_updated(json!({"online": 1})), RecipientRule::Broadcast)]
    fn test_recipient_rule_per_kind(#[case] event: DomainEvent, #[case] expected: RecipientRule) {
        assert_eq!(route(&event).rule, expected);
    }

    #[test]
    fn test_message_created_keeps_echoed_fields() {
        let mut fields = Map::new();
        fields.insert("content".to_string(), json!("hello"));
        let event = DomainEvent::message_created(42, 7, fields);

        let routed = route(&event);
        let value = serde_json::to_value(&routed.message).unwrap();

        assert_eq!(value["event"], "message_created");
        assert_eq!(value["message_id"], 42);
        assert_eq!(value["thread_id"], 7);
        assert_eq!(value["content"], "hello");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_nickname_updated_targets_owner() {
        let routed = route(&DomainEvent::nickname_updated(5, "Owl"));

        match routed.message {
            OutboundMessage::NicknameUpdated {
                user_id, nickname, ..
            } => {
                assert_eq!(user_id, 5);
                assert_eq!(nickname, "Owl");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[rstest]
    #[case::recent(Some(10), true)]
    #[case::just_expired(Some(60), false)]
    #[case::old(Some(3600), false)]
    #[case::never_changed(None, false)]
    fn test_cooldown_notice(#[case] changed_secs_ago: Option<i64>, #[case] expected: bool) {
        let now = Utc::now();
        let identity = identity(changed_secs_ago, now);

        let notice = cooldown_notice(&identity, now, Duration::from_secs(60));
        assert_eq!(notice.is_some(), expected);
    }

    #[test]
    fn test_cooldown_notice_carries_change_time() {
        let now = Utc::now();
        let identity = identity(Some(5), now);

        let notice = cooldown_notice(&identity, now, Duration::from_secs(60)).unwrap();
        assert_eq!(
            notice,
            OutboundMessage::NicknameUpdated {
                user_id: 1,
                nickname: "Fox".to_string(),
                timestamp: (now - chrono::Duration::seconds(5)).timestamp(),
            }
        );
    }
}
