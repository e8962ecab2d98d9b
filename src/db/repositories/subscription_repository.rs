use crate::db::models::{AlarmTime, DocPath, Fields};
use crate::db::paths::{self, CHANNEL_ID_FIELD, HAS_VOTED_FIELD, SUBSCRIBED_CHANNELS};
use crate::db::repositories::channel_repository::alarm_fields;
use crate::db::store::DocumentStore;
use crate::error::StoreError;
use serde_json::Value;

/// Paths of every user's cached copy of the channel, found through the
/// `channelId` field rather than by walking users.
pub async fn find_subscriptions(
    store: &dyn DocumentStore,
    channel_id: &str,
) -> Result<Vec<DocPath>, StoreError> {
    let docs = store
        .find_in_group(
            SUBSCRIBED_CHANNELS,
            CHANNEL_ID_FIELD,
            &Value::String(channel_id.to_string()),
        )
        .await?;

    Ok(docs.into_iter().map(|doc| doc.path).collect())
}

pub async fn set_subscription_alarm(
    store: &dyn DocumentStore,
    subscription: &DocPath,
    winner: Option<AlarmTime>,
) -> Result<(), StoreError> {
    store.set_merge(subscription, alarm_fields(winner)).await
}

pub async fn set_has_voted(
    store: &dyn DocumentStore,
    user_id: &str,
    channel_id: &str,
    has_voted: bool,
) -> Result<(), StoreError> {
    let mut fields = Fields::new();
    fields.insert(HAS_VOTED_FIELD.to_string(), Value::Bool(has_voted));
    store
        .set_merge(&paths::subscription(user_id, channel_id), fields)
        .await
}

pub async fn write_subscription(
    store: &dyn DocumentStore,
    user_id: &str,
    channel_id: &str,
    fields: Fields,
) -> Result<(), StoreError> {
    store
        .set_merge(&paths::subscription(user_id, channel_id), fields)
        .await
}
