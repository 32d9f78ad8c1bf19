use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use validator::Validate;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Devotional {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub scripture_reference: Option<String>,
    pub devotional_date: NaiveDate,
    pub status: DevotionalStatus,
    pub created_by_id: String,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 灵修短文不经过认领流程，只有草稿/发布/归档三态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DevotionalStatus {
    Draft,
    Published,
    Archived,
}

impl Default for DevotionalStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl DevotionalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl Devotional {
    pub fn new(title: String, content: String, devotional_date: NaiveDate, created_by_id: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            content,
            scripture_reference: None,
            devotional_date,
            status: DevotionalStatus::Draft,
            created_by_id,
            scheduled_publish_at: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due_for_publish(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_publish_at.map_or(false, |at| at <= now)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DevotionalPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DevotionalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_publish_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DevotionalPatch {
    pub fn apply(&self, devotional: &mut Devotional) {
        if let Some(status) = self.status {
            devotional.status = status;
        }
        if let Some(scheduled) = self.scheduled_publish_at {
            devotional.scheduled_publish_at = scheduled;
        }
        if let Some(published_at) = self.published_at {
            devotional.published_at = Some(published_at);
        }
        if let Some(updated_at) = self.updated_at {
            devotional.updated_at = updated_at;
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateDevotionalRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,

    #[validate(length(min = 1, max = 20000))]
    pub content: String,

    #[validate(length(max = 200))]
    pub scripture_reference: Option<String>,

    pub devotional_date: NaiveDate,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
}
