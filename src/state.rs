use crate::{
    config::Config,
    services::{
        AuthService, Database, DevotionalService, LessonService, NotificationService,
        PublicationScheduler, UserService,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: Arc<AuthService>,

    /// 用户档案与角色门禁
    pub user_service: UserService,

    /// 课程生命周期服务
    pub lesson_service: LessonService,

    /// 灵修短文服务
    pub devotional_service: DevotionalService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 定时发布扫描
    pub scheduler: PublicationScheduler,
}

impl AppState {
    /// 检查功能是否启用
    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        match feature {
            "devotionals" => self.config.enable_devotionals,
            "notifications" => self.config.enable_notifications,
            _ => false,
        }
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}
