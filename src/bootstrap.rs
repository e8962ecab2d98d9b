use crate::db::models::Fields;
use crate::db::paths::{CHANNEL_ID_FIELD, CHANNEL_NAME_FIELD, CURRENT_ALARM_FIELD, HAS_VOTED_FIELD};
use crate::db::repositories::{get_channel, write_subscription};
use crate::db::store::SharedStore;
use crate::error::StoreError;
use serde_json::Value;
use tracing::{info, warn};

/// Seeds a user's cached copy of a channel when they subscribe.
#[derive(Clone)]
pub struct Bootstrapper {
    store: SharedStore,
}

impl Bootstrapper {
    pub fn new(store: SharedStore) -> Self {
        Bootstrapper { store }
    }

    /// Copies `channelName` and `currentAlarm` from the channel as they are
    /// now and resets `hasVoted`. Running it again for the same pair leaves
    /// the same document behind.
    pub async fn bootstrap(&self, user_id: &str, channel_id: &str) -> Result<(), StoreError> {
        let store = self.store.as_ref();
        let channel = get_channel(store, channel_id).await?;

        let mut fields = Fields::new();
        fields.insert(
            CHANNEL_ID_FIELD.to_string(),
            Value::String(channel_id.to_string()),
        );
        match &channel {
            Some(channel) => {
                for field in [CHANNEL_NAME_FIELD, CURRENT_ALARM_FIELD] {
                    if let Some(value) = channel.fields.get(field) {
                        fields.insert(field.to_string(), value.clone());
                    }
                }
            }
            None => warn!(
                "Channel {} not found while subscribing {}, leaving name and alarm unset",
                channel_id, user_id
            ),
        }
        fields.insert(HAS_VOTED_FIELD.to_string(), Value::Bool(false));

        write_subscription(store, user_id, channel_id, fields).await?;
        info!("Subscribed {} to channel {}", user_id, channel_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::paths;
    use crate::db::store::DocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[tokio::test]
    async fn copies_channel_state() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_merge(
                &paths::channel("c1"),
                fields(json!({"channelName": "Morning", "currentAlarm": "2026-10-17T06:30:00.000Z"})),
            )
            .await
            .unwrap();

        Bootstrapper::new(store.clone())
            .bootstrap("u1", "c1")
            .await
            .unwrap();

        let doc = store
            .get(&paths::subscription("u1", "c1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            doc.fields,
            fields(json!({
                "channelId": "c1",
                "channelName": "Morning",
                "currentAlarm": "2026-10-17T06:30:00.000Z",
                "hasVoted": false,
            }))
        );
    }

    #[tokio::test]
    async fn rerun_yields_same_document() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_merge(&paths::channel("c1"), fields(json!({"channelName": "Morning"})))
            .await
            .unwrap();
        let bootstrapper = Bootstrapper::new(store.clone());

        bootstrapper.bootstrap("u1", "c1").await.unwrap();
        let first = store.get(&paths::subscription("u1", "c1")).await.unwrap();
        bootstrapper.bootstrap("u1", "c1").await.unwrap();
        bootstrapper.bootstrap("u1", "c1").await.unwrap();
        let last = store.get(&paths::subscription("u1", "c1")).await.unwrap();

        assert_eq!(first, last);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn missing_channel_still_creates_subscription() {
        let store = Arc::new(MemoryStore::new());

        Bootstrapper::new(store.clone())
            .bootstrap("u1", "ghost")
            .await
            .unwrap();

        let doc = store
            .get(&paths::subscription("u1", "ghost"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            doc.fields,
            fields(json!({"channelId": "ghost", "hasVoted": false}))
        );
    }
}
