use crate::{
    error::{AppError, Result},
    models::devotional::CreateDevotionalRequest,
    services::auth::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_devotional))
        .route("/published", get(list_published))
        .route("/drafts", get(list_drafts))
        .route("/:id", get(get_devotional))
        .route("/:id/publish", post(publish_devotional))
        .route("/:id/archive", post(archive_devotional))
}

fn ensure_enabled(state: &AppState) -> Result<()> {
    if !state.is_feature_enabled("devotionals") {
        return Err(AppError::ServiceUnavailable(
            "Devotionals are disabled".to_string(),
        ));
    }
    Ok(())
}

async fn create_devotional(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateDevotionalRequest>,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    state.user_service.require_manager(&user.id).await?;

    let devotional = state
        .devotional_service
        .create_devotional(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": devotional
    })))
}

async fn list_published(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    state.user_service.require_approved(&user.id).await?;

    let devotionals = state.devotional_service.list_published().await?;

    Ok(Json(json!({
        "success": true,
        "data": devotionals
    })))
}

async fn list_drafts(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    state.user_service.require_manager(&user.id).await?;

    let devotionals = state.devotional_service.list_drafts().await?;

    Ok(Json(json!({
        "success": true,
        "data": devotionals
    })))
}

async fn get_devotional(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(devotional_id): Path<String>,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    state.user_service.require_approved(&user.id).await?;

    let devotional = state.devotional_service.get_devotional(&devotional_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": devotional
    })))
}

async fn publish_devotional(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(devotional_id): Path<String>,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    state.user_service.require_manager(&user.id).await?;

    let devotional = state
        .devotional_service
        .publish_now(&devotional_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": devotional
    })))
}

async fn archive_devotional(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(devotional_id): Path<String>,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    state.user_service.require_manager(&user.id).await?;

    let devotional = state.devotional_service.archive(&devotional_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": devotional
    })))
}
