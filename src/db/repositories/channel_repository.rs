use crate::db::models::{AlarmTime, Document, Fields};
use crate::db::paths::{self, CURRENT_ALARM_FIELD};
use crate::db::store::DocumentStore;
use crate::error::StoreError;
use serde_json::Value;

pub async fn get_channel(
    store: &dyn DocumentStore,
    channel_id: &str,
) -> Result<Option<Document>, StoreError> {
    store.get(&paths::channel(channel_id)).await
}

/// Writes the winner onto the channel itself; `None` clears it to `null`.
pub async fn set_channel_alarm(
    store: &dyn DocumentStore,
    channel_id: &str,
    winner: Option<AlarmTime>,
) -> Result<(), StoreError> {
    store
        .set_merge(&paths::channel(channel_id), alarm_fields(winner))
        .await
}

pub(crate) fn alarm_fields(winner: Option<AlarmTime>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(
        CURRENT_ALARM_FIELD.to_string(),
        winner.map_or(Value::Null, AlarmTime::to_value),
    );
    fields
}
