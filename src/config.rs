use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub auth_service_url: String,
    pub jwt_secret: String,

    // Auto publish sweep
    pub auto_publish_interval: u64,

    // Content settings
    pub max_lesson_length: usize,
    pub max_complement_length: usize,

    // Feature flags
    pub enable_devotionals: bool,
    pub enable_notifications: bool,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "classroom".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),

            auto_publish_interval: env::var("AUTO_PUBLISH_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            max_lesson_length: env::var("MAX_LESSON_LENGTH")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            max_complement_length: env::var("MAX_COMPLEMENT_LENGTH")
                .unwrap_or_else(|_| "50000".to_string())
                .parse()?,

            enable_devotionals: env::var("ENABLE_DEVOTIONALS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            enable_notifications: env::var("ENABLE_NOTIFICATIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
