use crate::{error::Result, services::auth::AuthUser, state::AppState};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    let notifications = state.notification_service.list_for_user(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications
    })))
}

async fn unread_count(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    let count = state.notification_service.unread_count(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "unread": count }
    })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>> {
    let notification = state
        .notification_service
        .mark_read(&notification_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notification
    })))
}

async fn mark_all_read(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    state.notification_service.mark_all_read(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "All notifications marked as read"
    })))
}
