use crate::db::models::{ChangeEvent, CollectionPath, DocPath, Document, Fields};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;

pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Operations the sync core needs from the document database. Every write
/// touches a single document; nothing here spans documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Writes only the given fields, keeping the rest, creating the document
    /// if it does not exist.
    async fn set_merge(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    /// Overwrites the whole document with `fields`. Used to mirror state
    /// delivered by another store; the sync handlers only merge.
    async fn replace(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    /// All documents directly inside `collection`. Callers must not rely on
    /// the order, though both bundled stores return document id order.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    /// Collection group query: documents in any collection named
    /// `collection_id`, under any parent, whose `field` equals `value`.
    async fn find_in_group(
        &self,
        collection_id: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Stream of every write applied after this call returns. A store may
    /// deliver only the fields the trigger handlers read (`time`).
    async fn watch(&self) -> Result<ChangeStream, StoreError>;
}

pub type SharedStore = Arc<dyn DocumentStore>;
