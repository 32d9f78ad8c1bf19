use crate::{
    config::Config,
    error::{AppError, Result},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    Extension, RequestPartsExt, TypedHeader,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// 对接 Rainbow-Auth 的认证服务
///
/// 只负责身份：验证 JWT 并取回账号信息。角色与账号状态由本服务
/// 自己的用户档案表决定，见 UserService。
#[derive(Clone)]
pub struct AuthService {
    config: Config,
    http_client: Client,
    identity_cache: Arc<RwLock<HashMap<String, CachedIdentity>>>,
}

#[derive(Debug, Clone)]
struct CachedIdentity {
    user: AuthUser,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    pub session_id: Option<String>,
    pub email: Option<String>,
}

/// 已认证的请求方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Deserialize)]
struct RainbowAuthUserResponse {
    id: String,
    email: String,
    email_verified: bool,
    profile: Option<AuthProfileResponse>,
}

#[derive(Debug, Deserialize)]
struct AuthProfileResponse {
    display_name: Option<String>,
}

impl AuthService {
    pub async fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            identity_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub async fn get_user_from_rainbow_auth(&self, user_id: &str, token: &str) -> Result<AuthUser> {
        // 检查缓存
        if let Some(cached) = self.get_cached_identity(user_id).await {
            debug!("Using cached identity for user: {}", user_id);
            return Ok(cached);
        }

        let url = format!("{}/api/users/me", self.config.auth_service_url);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch user from Rainbow-Auth: {}", e);
                AppError::ServiceUnavailable("Failed to verify user with Rainbow-Auth".to_string())
            })?;

        if !response.status().is_success() {
            warn!("Rainbow-Auth returned error status: {}", response.status());
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let user_data: RainbowAuthUserResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Rainbow-Auth response: {}", e);
            AppError::Authentication("Invalid response from Rainbow-Auth".to_string())
        })?;

        let user = AuthUser {
            id: user_data.id.clone(),
            email: user_data.email,
            display_name: user_data.profile.and_then(|p| p.display_name),
            is_verified: user_data.email_verified,
        };

        self.cache_identity(&user_data.id, user.clone()).await;

        Ok(user)
    }

    async fn get_cached_identity(&self, user_id: &str) -> Option<AuthUser> {
        let cache = self.identity_cache.read().await;
        if let Some(cached) = cache.get(user_id) {
            if cached.expires_at > Utc::now() {
                return Some(cached.user.clone());
            }
        }
        None
    }

    async fn cache_identity(&self, user_id: &str, user: AuthUser) {
        let mut cache = self.identity_cache.write().await;
        cache.insert(
            user_id.to_string(),
            CachedIdentity {
                user,
                expires_at: Utc::now() + Duration::minutes(15), // 缓存15分钟
            },
        );
    }

    /// 清理过期缓存（后台任务定期调用）
    pub async fn cleanup_expired_sessions(&self) {
        let now = Utc::now();
        let mut cache = self.identity_cache.write().await;
        let before_count = cache.len();
        cache.retain(|_, cached| cached.expires_at > now);
        debug!("Cleaned {} expired identity cache entries", before_count - cache.len());
    }
}

// Axum extractor for authentication
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing authorization header".to_string()))?;

        let Extension(auth_service): Extension<Arc<AuthService>> = parts
            .extract::<Extension<Arc<AuthService>>>()
            .await
            .map_err(|_| {
                AppError::Internal("Auth service not found in request extensions".to_string())
            })?;

        let claims = auth_service.verify_jwt(bearer.token())?;

        auth_service
            .get_user_from_rainbow_auth(&claims.sub, bearer.token())
            .await
    }
}
