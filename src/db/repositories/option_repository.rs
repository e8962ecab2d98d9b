use crate::db::models::{DocPath, Document, Fields};
use crate::db::paths::{self, VOTES_FIELD};
use crate::db::store::DocumentStore;
use crate::error::StoreError;
use serde_json::Value;

pub async fn list_options(
    store: &dyn DocumentStore,
    channel_id: &str,
) -> Result<Vec<Document>, StoreError> {
    store.list(&paths::options(channel_id)).await
}

pub async fn set_option_votes(
    store: &dyn DocumentStore,
    option: &DocPath,
    votes: u64,
) -> Result<(), StoreError> {
    let mut fields = Fields::new();
    fields.insert(VOTES_FIELD.to_string(), Value::from(votes));
    store.set_merge(option, fields).await
}
