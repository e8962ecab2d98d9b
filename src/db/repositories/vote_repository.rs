use crate::db::models::Document;
use crate::db::paths;
use crate::db::store::DocumentStore;
use crate::error::StoreError;

/// Every vote document for the channel, in the order the store returns them.
pub async fn list_votes(
    store: &dyn DocumentStore,
    channel_id: &str,
) -> Result<Vec<Document>, StoreError> {
    store.list(&paths::votes(channel_id)).await
}
