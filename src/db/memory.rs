use crate::db::models::{ChangeEvent, CollectionPath, DocPath, Document, Fields};
use crate::db::store::{ChangeStream, DocumentStore};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;

const CHANGE_FEED_CAPACITY: usize = 1024;

/// Process-local store used when no database is configured, and by tests.
/// Publishes every write on a broadcast channel.
pub struct MemoryStore {
    docs: RwLock<BTreeMap<DocPath, Fields>>,
    deleted_parents: RwLock<BTreeSet<String>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        MemoryStore {
            docs: RwLock::new(BTreeMap::new()),
            deleted_parents: RwLock::new(BTreeSet::new()),
            changes,
        }
    }

    /// Makes every later write below `parent` fail with
    /// [`StoreError::MissingParent`], as happens when a user is removed while
    /// a fan-out is still writing to their subscriptions. Documents already
    /// stored stay readable.
    pub async fn mark_parent_deleted(&self, parent: &DocPath) {
        self.deleted_parents
            .write()
            .await
            .insert(parent.as_str().to_string());
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    async fn check_parent(&self, path: &DocPath) -> Result<(), StoreError> {
        let deleted = self.deleted_parents.read().await;
        if deleted.iter().any(|parent| path.is_under(parent)) {
            return Err(StoreError::MissingParent(path.to_string()));
        }
        Ok(())
    }

    fn publish(&self, path: &DocPath, before: Option<Fields>, after: Option<Fields>) {
        // No receivers simply means nobody is watching yet.
        let _ = self.changes.send(ChangeEvent {
            path: path.clone(),
            before,
            after,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs
            .get(path)
            .map(|fields| Document::new(path.clone(), fields.clone())))
    }

    async fn set_merge(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.check_parent(path).await?;

        let (before, after) = {
            let mut docs = self.docs.write().await;
            let before = docs.get(path).cloned();
            let entry = docs.entry(path.clone()).or_default();
            entry.extend(fields);
            (before, entry.clone())
        };

        self.publish(path, before, Some(after));
        Ok(())
    }

    async fn replace(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.check_parent(path).await?;

        let before = self.docs.write().await.insert(path.clone(), fields.clone());
        self.publish(path, before, Some(fields));
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let removed = self.docs.write().await.remove(path);
        if let Some(before) = removed {
            self.publish(path, Some(before), None);
        }
        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|(path, _)| path.parent() == *collection)
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
            .collect())
    }

    async fn find_in_group(
        &self,
        collection_id: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|(path, fields)| {
                path.collection_id() == collection_id && fields.get(field) == Some(value)
            })
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
            .collect())
    }

    async fn watch(&self) -> Result<ChangeStream, StoreError> {
        let stream = BroadcastStream::new(self.changes.subscribe()).filter_map(|item| async move {
            match item {
                Ok(change) => Some(change),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Change feed lagged, {} changes dropped", skipped);
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}
