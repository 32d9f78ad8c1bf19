use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use validator::Validate;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub scripture_reference: Option<String>,
    /// 教师撰写的辅助材料（仅在认领后填写）
    pub complement: Option<String>,
    /// 授课日期
    pub lesson_date: NaiveDate,
    pub status: LessonStatus,
    pub created_by_id: String,
    pub reserved_professor_id: Option<String>,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub draft_saved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Draft,
    Available,
    ReservationPending,
    Reserved,
    Published,
    Archived,
}

impl Default for LessonStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl LessonStatus {
    /// 状态机的有向边，发布流程只能沿这些边前进
    pub fn can_transition_to(&self, next: LessonStatus) -> bool {
        use LessonStatus::*;
        matches!(
            (*self, next),
            (Draft, Published)
                | (Draft, Available)
                | (Available, ReservationPending)
                | (Available, Published)
                | (ReservationPending, Reserved)
                | (ReservationPending, Available)
                | (Reserved, Published)
                | (Published, Archived)
        )
    }

    /// 是否允许手动发布
    pub fn can_publish(&self) -> bool {
        matches!(self, Self::Draft | Self::Available | Self::Reserved)
    }

    /// 定时发布扫描关注的课程状态（创建时即可带定时发布时间）
    pub fn sweep_candidates() -> &'static [LessonStatus] {
        &[LessonStatus::Draft, LessonStatus::Available, LessonStatus::Reserved]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Available => "available",
            Self::ReservationPending => "reservation_pending",
            Self::Reserved => "reserved",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl Lesson {
    pub fn new(title: String, description: String, lesson_date: NaiveDate, created_by_id: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            scripture_reference: None,
            complement: None,
            lesson_date,
            status: LessonStatus::Draft,
            created_by_id,
            reserved_professor_id: None,
            scheduled_publish_at: None,
            published_at: None,
            draft_saved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == LessonStatus::Published
    }

    /// 定时发布时间已到期
    pub fn is_due_for_publish(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_publish_at.map_or(false, |at| at <= now)
    }
}

/// 针对单条课程记录的条件更新补丁
///
/// 外层`None`表示字段不变；`reserved_professor_id`和`scheduled_publish_at`
/// 使用双层`Option`，`Some(None)`表示显式清空。
#[derive(Debug, Clone, Default, Serialize)]
pub struct LessonPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LessonStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_professor_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_publish_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LessonPatch {
    pub fn apply(&self, lesson: &mut Lesson) {
        if let Some(status) = self.status {
            lesson.status = status;
        }
        if let Some(complement) = &self.complement {
            lesson.complement = Some(complement.clone());
        }
        if let Some(reserved) = &self.reserved_professor_id {
            lesson.reserved_professor_id = reserved.clone();
        }
        if let Some(scheduled) = self.scheduled_publish_at {
            lesson.scheduled_publish_at = scheduled;
        }
        if let Some(published_at) = self.published_at {
            lesson.published_at = Some(published_at);
        }
        if let Some(draft_saved_at) = self.draft_saved_at {
            lesson.draft_saved_at = Some(draft_saved_at);
        }
        if let Some(updated_at) = self.updated_at {
            lesson.updated_at = updated_at;
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,

    #[validate(length(min = 1, max = 10000))]
    pub description: String,

    #[validate(length(max = 200))]
    pub scripture_reference: Option<String>,

    pub lesson_date: NaiveDate,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenForReservationRequest {
    pub scheduled_publish_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaveComplementRequest {
    #[validate(length(min = 1, max = 50000))]
    pub complement: String,
}

/// 协调员管理视图：草稿 + 备课中的课程
#[derive(Debug, Serialize, Deserialize)]
pub struct ManagerLessonsResponse {
    pub drafts: Vec<Lesson>,
    pub in_preparation: Vec<Lesson>,
}
