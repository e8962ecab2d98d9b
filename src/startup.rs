use crate::config::Config;
use crate::db::connection::{DbPool, PgDocumentStore, get_pool_stats, init_db};
use crate::db::memory::MemoryStore;
use crate::db::store::SharedStore;
use crate::error::StoreError;
use crate::triggers::{Dispatcher, health, receive_change};
use axum::{
    Router,
    extract::Extension,
    http::header::{ACCEPT, CONTENT_TYPE},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(store: SharedStore, serialize_channels: bool) -> Self {
        let dispatcher = Dispatcher::new(store.clone(), serialize_channels);
        AppState { store, dispatcher }
    }
}

/// Opens the configured store: PostgreSQL when `DATABASE_URL` is set,
/// otherwise a process-local in-memory store.
pub async fn connect_store(config: &Config) -> Result<SharedStore, StoreError> {
    match &config.database_url {
        Some(url) => {
            let pool = init_db(url, config.max_connections, &config.notify_channel).await?;
            info!("Connected to PostgreSQL document store");
            spawn_health_check(pool.clone());
            Ok(Arc::new(PgDocumentStore::new(pool, &config.notify_channel)))
        }
        None => {
            warn!("DATABASE_URL not set, documents are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn spawn_health_check(pool: DbPool) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match pool.acquire().await {
                Ok(conn) => {
                    drop(conn);
                    debug!("{}", get_pool_stats(&pool));
                }
                Err(e) => {
                    error!("Database connection health check failed: {}", e);
                }
            }
        }
    });
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/triggers", post(receive_change))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(app_state))
                .layer(
                    CorsLayer::new()
                        .allow_origin(AllowOrigin::mirror_request())
                        .allow_methods([axum::http::Method::POST, axum::http::Method::GET])
                        .allow_headers([CONTENT_TYPE, ACCEPT]),
                ),
        )
}
