use axum::{
    http::{HeaderValue, Method},
    routing::{get, Router},
};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod models;
mod routes;
mod services;
mod state;
mod utils;

use crate::{
    config::Config,
    services::{
        repository::{
            SurrealDevotionalRepository, SurrealLessonRepository, SurrealNotificationRepository,
            SurrealReservationRepository, SurrealUserDirectory,
        },
        AuthService, Database, DevotionalService, LessonService, NotificationService,
        PublicationScheduler, UserService,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "rainbow_classroom=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-Classroom service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => match db.verify_connection().await {
            Ok(_) => {
                info!("Database connection established successfully");
                db
            }
            Err(e) => {
                warn!("Database connection failed: {}", e);
                info!("Attempting to auto-start database...");

                if let Err(start_err) = auto_start_database(&config).await {
                    error!(
                        "Failed to auto-start database: {}. Original error: {}",
                        start_err, e
                    );
                    return Err(anyhow::anyhow!("Database connection failed"));
                }

                let db = Database::new(&config).await?;
                db.verify_connection().await?;
                info!("Database auto-started and connected successfully");
                db
            }
        },
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });

    // 仓库与服务
    let lessons = Arc::new(SurrealLessonRepository::new(db.clone()));
    let reservations = Arc::new(SurrealReservationRepository::new(db.clone()));
    let devotionals = Arc::new(SurrealDevotionalRepository::new(db.clone()));
    let notifications = Arc::new(SurrealNotificationRepository::new(db.clone()));
    let directory = Arc::new(SurrealUserDirectory::new(db.clone()));

    let auth_service = Arc::new(AuthService::new(&config).await?);
    let user_service = UserService::new(directory.clone());
    let notification_service = NotificationService::new(notifications, directory)
        .with_enabled(config.enable_notifications);
    let lesson_service = LessonService::new(
        lessons.clone(),
        reservations,
        notification_service.clone(),
    );
    let devotional_service =
        DevotionalService::new(devotionals.clone(), notification_service.clone());
    let scheduler = PublicationScheduler::new(
        lessons,
        devotionals,
        lesson_service.clone(),
        devotional_service.clone(),
    );

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth_service,
        user_service,
        lesson_service,
        devotional_service,
        notification_service,
        scheduler,
    });

    // 启动后台任务
    start_background_tasks(app_state.clone()).await;

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(
            config
                .cors_allowed_origins
                .split(',')
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        );

    // 构建应用路由 - 使用/api/classroom/前缀避免网关路由冲突
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/classroom/lessons", routes::lessons::router())
        .nest("/api/classroom/devotionals", routes::devotionals::router())
        .nest("/api/classroom/notifications", routes::notifications::router())
        .nest("/api/classroom/users", routes::users::router())
        .layer(axum::middleware::from_fn(
            utils::middleware::request_logging_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            utils::middleware::auth_middleware,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Rainbow-Classroom is running!"
}

async fn auto_start_database(config: &Config) -> anyhow::Result<()> {
    info!("Attempting to start SurrealDB...");

    let output = tokio::process::Command::new("surreal")
        .args([
            "start",
            "--user",
            &config.database_username,
            "--pass",
            &config.database_password,
            "memory",
        ])
        .spawn();

    match output {
        Ok(_) => {
            info!("SurrealDB started successfully");
            // 等待数据库启动
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }
        Err(e) => {
            error!("Failed to start SurrealDB: {}", e);
            Err(anyhow::anyhow!("Failed to start database"))
        }
    }
}

async fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 定时发布扫描任务
    let sweep_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(sweep_state.config.auto_publish_interval));

        loop {
            interval.tick().await;
            if let Err(e) = sweep_state.scheduler.sweep().await {
                error!("Publication sweep failed: {}", e);
            }
        }
    });

    // 清理过期会话任务
    let auth_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(3600)); // 每小时执行一次

        loop {
            interval.tick().await;
            auth_state.auth_service.cleanup_expired_sessions().await;
        }
    });

    info!("Background tasks started successfully");
}
