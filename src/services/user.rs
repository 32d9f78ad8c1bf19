use crate::{
    error::{AppError, Result},
    models::user::{AccountStatus, UserProfile},
    services::repository::UserDirectory,
};
use std::sync::Arc;
use tracing::debug;

/// 用户档案读取与角色门禁
///
/// 认证只证明「是谁」，这里决定「能做什么」：档案缺失或未批准的
/// 账号一律拒绝，角色检查由各路由按操作调用。
#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.directory
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User profile"))
    }

    /// 取出已批准账号的档案；未注册或未批准的账号被拒绝
    pub async fn require_approved(&self, user_id: &str) -> Result<UserProfile> {
        let profile = self
            .directory
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::forbidden("No classroom profile for this account"))?;

        if profile.account_status != AccountStatus::Approved {
            debug!("Rejecting user {} with account status {:?}", user_id, profile.account_status);
            return Err(AppError::forbidden("Account is not approved"));
        }

        Ok(profile)
    }

    /// 课程管理操作：协调员或管理员
    pub async fn require_manager(&self, user_id: &str) -> Result<UserProfile> {
        let profile = self.require_approved(user_id).await?;
        if !profile.role.can_manage_lessons() {
            return Err(AppError::forbidden(
                "Only coordinators and admins can perform this action",
            ));
        }
        Ok(profile)
    }

    /// 认领与撰写操作：教师
    pub async fn require_professor(&self, user_id: &str) -> Result<UserProfile> {
        let profile = self.require_approved(user_id).await?;
        if !profile.role.is_professor() {
            return Err(AppError::forbidden("Only professors can perform this action"));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use crate::services::testing::{profile, MemoryUserDirectory};

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryUserDirectory::new(vec![
            profile("prof-1", UserRole::Professor, AccountStatus::Approved),
            profile("coord-1", UserRole::Coordinator, AccountStatus::Approved),
            profile("admin-1", UserRole::Admin, AccountStatus::Approved),
            profile("member-1", UserRole::Member, AccountStatus::Approved),
            profile("pending-1", UserRole::Professor, AccountStatus::Pending),
        ])))
    }

    #[tokio::test]
    async fn test_manager_gate() {
        let service = service();

        assert!(service.require_manager("coord-1").await.is_ok());
        assert!(service.require_manager("admin-1").await.is_ok());

        let err = service.require_manager("prof-1").await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_professor_gate() {
        let service = service();

        assert!(service.require_professor("prof-1").await.is_ok());

        let err = service.require_professor("member-1").await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        // 未批准的账号即使角色匹配也被拒绝
        let err = service.require_professor("pending-1").await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let service = service();

        let err = service.require_approved("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
}
