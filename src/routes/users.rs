use crate::{error::Result, services::auth::AuthUser, state::AppState};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(get_my_profile))
}

/// 当前用户在本服务内的档案（角色、账号状态）
async fn get_my_profile(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<Value>> {
    let profile = state.user_service.get_profile(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "profile": profile,
            "email": user.email,
            "is_verified": user.is_verified
        }
    })))
}
