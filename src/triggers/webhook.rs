use crate::db::models::ChangeEvent;
use crate::db::store::DocumentStore;
use crate::error::{StoreError, TriggerError};
use crate::startup::AppState;
use crate::triggers::models::TriggerEvent;
use axum::{
    extract::{Extension, Json, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

/// Accepts a change notification pushed by another document store, applies
/// the delivered state to the configured store and runs the matching handler
/// before answering. Handler failures are reported in the body, never as an
/// error status, so the sender does not redeliver.
pub async fn receive_change(
    Extension(app_state): Extension<AppState>,
    payload: Result<Json<ChangeEvent>, JsonRejection>,
) -> Result<impl IntoResponse, TriggerError> {
    let Json(change) = payload?;
    if change.before.is_none() && change.after.is_none() {
        return Err(TriggerError::MalformedPayload(format!(
            "change to {} carries neither a before nor an after state",
            change.path
        )));
    }

    let path = change.path.to_string();
    mirror(app_state.store.as_ref(), change.clone()).await?;

    let Some(event) = TriggerEvent::classify(change) else {
        info!("Mirrored change to {}, no trigger", path);
        return Ok((
            StatusCode::OK,
            Json(json!({"path": path, "dispatched": false})),
        ));
    };

    info!(
        "Dispatching change to {} for user {} in channel {}",
        path,
        event.user_id(),
        event.channel_id()
    );
    let outcome = app_state.dispatcher.dispatch(event).await;
    Ok((
        StatusCode::OK,
        Json(json!({
            "path": path,
            "dispatched": true,
            "result": outcome.to_json(),
        })),
    ))
}

/// Makes the local copy of the changed document match the delivered state.
async fn mirror(store: &dyn DocumentStore, change: ChangeEvent) -> Result<(), StoreError> {
    match change.after {
        Some(after) => store.replace(&change.path, after).await,
        None => store.delete(&change.path).await,
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
