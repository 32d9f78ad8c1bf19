use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    /// 关联实体（lesson/devotional/reservation），用于客户端跳转
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewReservation,
    ReservationApproved,
    ReservationRejected,
    NewNotice,
    NewLesson,
    NewDevotional,
}

impl Notification {
    pub fn new(recipient_id: String, event: &NotificationEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient_id,
            notification_type: event.notification_type,
            title: event.title.clone(),
            message: event.message.clone(),
            reference_type: event.reference_type.clone(),
            reference_id: event.reference_id.clone(),
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}

/// 触发通知扩散的事件描述
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
}

impl NotificationEvent {
    pub fn new_lesson(lesson_id: &str, lesson_title: &str) -> Self {
        Self {
            notification_type: NotificationType::NewLesson,
            title: "新课程已发布".to_string(),
            message: format!("课程《{}》已发布，点击查看", lesson_title),
            reference_type: Some("lesson".to_string()),
            reference_id: Some(lesson_id.to_string()),
        }
    }

    pub fn new_devotional(devotional_id: &str, devotional_title: &str) -> Self {
        Self {
            notification_type: NotificationType::NewDevotional,
            title: "新灵修短文已发布".to_string(),
            message: format!("灵修短文《{}》已发布，点击查看", devotional_title),
            reference_type: Some("devotional".to_string()),
            reference_id: Some(devotional_id.to_string()),
        }
    }

    pub fn new_reservation(lesson_id: &str, lesson_title: &str) -> Self {
        Self {
            notification_type: NotificationType::NewReservation,
            title: "新的课程认领申请".to_string(),
            message: format!("有教师申请认领课程《{}》，等待审批", lesson_title),
            reference_type: Some("lesson".to_string()),
            reference_id: Some(lesson_id.to_string()),
        }
    }

    pub fn reservation_approved(lesson_id: &str, lesson_title: &str) -> Self {
        Self {
            notification_type: NotificationType::ReservationApproved,
            title: "认领申请已通过".to_string(),
            message: format!("您对课程《{}》的认领申请已通过，可以开始备课", lesson_title),
            reference_type: Some("lesson".to_string()),
            reference_id: Some(lesson_id.to_string()),
        }
    }

    pub fn reservation_rejected(lesson_id: &str, lesson_title: &str) -> Self {
        Self {
            notification_type: NotificationType::ReservationRejected,
            title: "认领申请未通过".to_string(),
            message: format!("您对课程《{}》的认领申请未通过，该课程已重新开放", lesson_title),
            reference_type: Some("lesson".to_string()),
            reference_id: Some(lesson_id.to_string()),
        }
    }
}
