use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 教师对一节课程的认领申请
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    pub lesson_id: String,
    pub professor_id: String,
    pub status: ReservationStatus,
    /// 审批人（协调员/管理员）
    pub decided_by_id: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl ReservationRequest {
    pub fn new(lesson_id: String, professor_id: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            lesson_id,
            professor_id,
            status: ReservationStatus::Pending,
            decided_by_id: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 未被驳回的申请会阻止同一教师重复申请
    pub fn blocks_new_request(&self) -> bool {
        matches!(self.status, ReservationStatus::Pending | ReservationStatus::Approved)
    }
}
