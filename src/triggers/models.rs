use crate::db::models::{ChangeEvent, ChangeKind, Fields};
use crate::db::paths::{CHANNELS, SUBSCRIBERS, TIME_FIELD, VOTES};

/// A voter wrote, changed or removed their vote in a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteChanged {
    pub channel_id: String,
    pub user_id: String,
    pub after: Option<Fields>,
}

impl VoteChanged {
    /// Whether the vote as written now carries a time. A deleted vote or a
    /// `null` time is an opt-out.
    pub fn has_voted(&self) -> bool {
        self.after
            .as_ref()
            .and_then(|fields| fields.get(TIME_FIELD))
            .is_some_and(|time| !time.is_null())
    }
}

/// A user joined a channel's subscriber list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberAdded {
    pub channel_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    VoteChanged(VoteChanged),
    SubscriberAdded(SubscriberAdded),
}

impl TriggerEvent {
    /// Maps a raw document change onto the event it triggers, if any.
    ///
    /// Every write to `channels/{c}/votes/{u}` is a vote change; only the
    /// creation of `channels/{c}/subscribers/{u}` adds a subscriber.
    pub fn classify(change: ChangeEvent) -> Option<Self> {
        let kind = change.kind();
        let segments: Vec<&str> = change.path.segments().collect();

        match segments.as_slice() {
            [CHANNELS, channel_id, VOTES, user_id] => {
                let (channel_id, user_id) = (channel_id.to_string(), user_id.to_string());
                Some(TriggerEvent::VoteChanged(VoteChanged {
                    channel_id,
                    user_id,
                    after: change.after,
                }))
            }
            [CHANNELS, channel_id, SUBSCRIBERS, user_id] if kind == ChangeKind::Create => {
                Some(TriggerEvent::SubscriberAdded(SubscriberAdded {
                    channel_id: channel_id.to_string(),
                    user_id: user_id.to_string(),
                }))
            }
            _ => None,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            TriggerEvent::VoteChanged(event) => &event.channel_id,
            TriggerEvent::SubscriberAdded(event) => &event.channel_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            TriggerEvent::VoteChanged(event) => &event.user_id,
            TriggerEvent::SubscriberAdded(event) => &event.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DocPath;
    use serde_json::{Value, json};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn change(path: &str, before: Option<Value>, after: Option<Value>) -> ChangeEvent {
        ChangeEvent {
            path: DocPath::parse(path).unwrap(),
            before: before.map(fields),
            after: after.map(fields),
        }
    }

    #[test]
    fn any_vote_write_is_a_vote_change() {
        for (before, after) in [
            (None, Some(json!({"time": 1}))),
            (Some(json!({"time": 1})), Some(json!({"time": 2}))),
            (Some(json!({"time": 2})), None),
        ] {
            let event = TriggerEvent::classify(change("channels/c1/votes/u1", before, after));
            match event {
                Some(TriggerEvent::VoteChanged(vote)) => {
                    assert_eq!(vote.channel_id, "c1");
                    assert_eq!(vote.user_id, "u1");
                }
                other => panic!("expected vote change, got {other:?}"),
            }
        }
    }

    #[test]
    fn only_subscriber_creation_triggers_bootstrap() {
        let created = TriggerEvent::classify(change(
            "channels/c1/subscribers/u1",
            None,
            Some(json!({})),
        ));
        assert_eq!(
            created,
            Some(TriggerEvent::SubscriberAdded(SubscriberAdded {
                channel_id: "c1".to_string(),
                user_id: "u1".to_string(),
            }))
        );

        let updated = TriggerEvent::classify(change(
            "channels/c1/subscribers/u1",
            Some(json!({})),
            Some(json!({"muted": true})),
        ));
        assert_eq!(updated, None);

        let deleted =
            TriggerEvent::classify(change("channels/c1/subscribers/u1", Some(json!({})), None));
        assert_eq!(deleted, None);
    }

    #[test]
    fn derived_documents_are_ignored() {
        for path in [
            "channels/c1",
            "channels/c1/options/o1",
            "users/u1/subscribed_channels/c1",
            "channels/c1/votes/u1/history/h1",
        ] {
            let event = TriggerEvent::classify(change(path, None, Some(json!({"votes": 1}))));
            assert_eq!(event, None, "{path}");
        }
    }

    #[test]
    fn has_voted_follows_new_time() {
        let vote = |after: Option<Value>| VoteChanged {
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            after: after.map(fields),
        };

        assert!(vote(Some(json!({"time": "2026-10-17T06:30:00.000Z"}))).has_voted());
        assert!(!vote(Some(json!({"time": null}))).has_voted());
        assert!(!vote(Some(json!({}))).has_voted());
        assert!(!vote(None).has_voted());
    }
}
