use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// 本服务维护的用户档案投影
///
/// 档案由平台的注册流程写入，这里只读取角色和账号状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    pub display_name: String,
    pub role: UserRole,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Member,
    Professor,
    Coordinator,
    Admin,
}

impl UserRole {
    /// 协调员与管理员是认领申请的审批方
    pub fn can_manage_lessons(&self) -> bool {
        matches!(self, Self::Coordinator | Self::Admin)
    }

    pub fn is_professor(&self) -> bool {
        matches!(self, Self::Professor)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Approved,
    Disabled,
}
