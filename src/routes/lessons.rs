use crate::{
    error::Result,
    models::lesson::*,
    services::auth::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_lesson))
        .route("/available", get(list_available))
        .route("/mine", get(list_mine))
        .route("/manage", get(list_for_manager))
        .route("/published", get(list_published))
        .route("/:id", get(get_lesson))
        .route("/:id/open", post(open_for_reservation))
        .route("/:id/reserve", post(request_reservation))
        .route("/:id/approve", post(approve_reservation))
        .route("/:id/reject", post(reject_reservation))
        .route("/:id/complement", put(save_complement))
        .route("/:id/publish", post(publish_lesson))
        .route("/:id/archive", post(archive_lesson))
}

async fn create_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateLessonRequest>,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let lesson = state.lesson_service.create_lesson(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn list_available(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    state.user_service.require_approved(&user.id).await?;

    let lessons = state.lesson_service.list_available().await?;

    Ok(Json(json!({
        "success": true,
        "data": lessons
    })))
}

async fn list_mine(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    state.user_service.require_professor(&user.id).await?;

    let lessons = state.lesson_service.list_for_professor(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": lessons
    })))
}

async fn list_for_manager(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let view = state.lesson_service.list_for_manager().await?;

    Ok(Json(json!({
        "success": true,
        "data": view
    })))
}

async fn list_published(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    state.user_service.require_approved(&user.id).await?;

    let lessons = state.lesson_service.list_published().await?;

    Ok(Json(json!({
        "success": true,
        "data": lessons
    })))
}

async fn get_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    state.user_service.require_approved(&user.id).await?;

    let lesson = state.lesson_service.get_lesson(&lesson_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn open_for_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
    Json(request): Json<OpenForReservationRequest>,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let lesson = state
        .lesson_service
        .open_for_reservation(&lesson_id, request.scheduled_publish_at)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn request_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    state.user_service.require_professor(&user.id).await?;

    let lesson = state
        .lesson_service
        .request_reservation(&lesson_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn approve_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let lesson = state
        .lesson_service
        .approve_reservation(&lesson_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn reject_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let lesson = state
        .lesson_service
        .reject_reservation(&lesson_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn save_complement(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
    Json(request): Json<SaveComplementRequest>,
) -> Result<Json<Value>> {
    state.user_service.require_professor(&user.id).await?;

    let lesson = state
        .lesson_service
        .save_complement(&lesson_id, &user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn publish_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let lesson = state.lesson_service.publish_now(&lesson_id, &user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}

async fn archive_lesson(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(lesson_id): Path<String>,
) -> Result<Json<Value>> {
    state.user_service.require_manager(&user.id).await?;

    let lesson = state.lesson_service.archive(&lesson_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": lesson
    })))
}
