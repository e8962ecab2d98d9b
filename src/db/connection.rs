use crate::db::models::{ChangeEvent, CollectionPath, DocPath, Document, Fields};
use crate::db::store::{ChangeStream, DocumentStore};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::{error, warn};

pub type DbPool = Pool<Postgres>;

pub async fn init_db(
    database_url: &str,
    max_connections: u32,
    notify_channel: &str,
) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .max_lifetime(Duration::from_secs(30 * 60))
        .idle_timeout(Duration::from_secs(10 * 60))
        .connect(database_url)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            path TEXT PRIMARY KEY,
            parent_path TEXT NOT NULL,
            collection_id TEXT NOT NULL,
            data JSONB NOT NULL DEFAULT '{}'::jsonb,
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_parent_path ON documents(parent_path)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_collection_id ON documents(collection_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_data ON documents USING GIN (data jsonb_path_ops)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION notify_document_change() RETURNS trigger AS $$
        DECLARE
            payload JSON;
        BEGIN
            -- NOTIFY payloads must stay under 8000 bytes, so only `time` is sent.
            IF TG_OP = 'INSERT' THEN
                payload := json_build_object(
                    'path', NEW.path, 'op', TG_OP,
                    'before', NULL,
                    'after', jsonb_strip_nulls(jsonb_build_object('time', NEW.data->'time')));
            ELSIF TG_OP = 'UPDATE' THEN
                payload := json_build_object(
                    'path', NEW.path, 'op', TG_OP,
                    'before', jsonb_strip_nulls(jsonb_build_object('time', OLD.data->'time')),
                    'after', jsonb_strip_nulls(jsonb_build_object('time', NEW.data->'time')));
            ELSE
                payload := json_build_object(
                    'path', OLD.path, 'op', TG_OP,
                    'before', jsonb_strip_nulls(jsonb_build_object('time', OLD.data->'time')),
                    'after', NULL);
            END IF;
            PERFORM pg_notify(TG_ARGV[0], payload::text);
            RETURN NULL;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("DROP TRIGGER IF EXISTS documents_notify ON documents")
        .execute(&pool)
        .await?;

    // Trigger arguments cannot be bound; the channel name is validated as an
    // identifier when the configuration is loaded.
    sqlx::query(&format!(
        "CREATE TRIGGER documents_notify AFTER INSERT OR UPDATE OR DELETE ON documents \
         FOR EACH ROW EXECUTE FUNCTION notify_document_change('{notify_channel}')"
    ))
    .execute(&pool)
    .await?;

    Ok(pool)
}

pub fn get_pool_stats(pool: &DbPool) -> String {
    let size = pool.size() as usize;
    let num_idle = pool.num_idle();
    format!(
        "Pool stats: size={}, idle={}, available={}",
        size,
        num_idle,
        size.saturating_sub(num_idle)
    )
}

/// Documents kept as JSONB rows keyed by their full path. Changes are
/// published with `pg_notify` by the `documents_notify` trigger; their
/// before/after states carry only the `time` field.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: DbPool,
    notify_channel: String,
}

impl PgDocumentStore {
    pub fn new(pool: DbPool, notify_channel: impl Into<String>) -> Self {
        PgDocumentStore {
            pool,
            notify_channel: notify_channel.into(),
        }
    }
}

fn row_to_document(row: PgRow) -> Result<Document, StoreError> {
    let path: String = row.try_get("path")?;
    let Json(fields): Json<Fields> = row.try_get("data")?;
    Ok(Document::new(DocPath::parse(&path)?, fields))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT path, data FROM documents WHERE path = $1")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_document).transpose()
    }

    async fn set_merge(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (path, parent_path, collection_id, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (path) DO UPDATE
            SET data = documents.data || EXCLUDED.data, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(path.as_str())
        .bind(path.parent().as_str())
        .bind(path.collection_id())
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (path, parent_path, collection_id, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (path) DO UPDATE
            SET data = EXCLUDED.data, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(path.as_str())
        .bind(path.parent().as_str())
        .bind(path.collection_id())
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE path = $1")
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT path, data FROM documents WHERE parent_path = $1 ORDER BY path",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_document).collect()
    }

    async fn find_in_group(
        &self,
        collection_id: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let mut filter = Fields::new();
        filter.insert(field.to_string(), value.clone());

        let rows = sqlx::query(
            "SELECT path, data FROM documents WHERE collection_id = $1 AND data @> $2 ORDER BY path",
        )
        .bind(collection_id)
        .bind(Json(Value::Object(filter)))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_document).collect()
    }

    async fn watch(&self) -> Result<ChangeStream, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.notify_channel).await?;

        let stream = async_stream::stream! {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                            Ok(change) => yield change,
                            Err(e) => warn!("Ignoring undecodable change notification: {}", e),
                        }
                    }
                    Err(e) => {
                        // The listener reconnects on the next recv.
                        error!("Change feed listener error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}
