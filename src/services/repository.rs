use crate::{
    error::Result,
    models::{
        devotional::{Devotional, DevotionalPatch, DevotionalStatus},
        lesson::{Lesson, LessonPatch, LessonStatus},
        notification::Notification,
        reservation::{ReservationRequest, ReservationStatus},
        user::UserProfile,
    },
    services::Database,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// 课程仓库契约
///
/// `conditional_update` 是整个状态机的并发控制原语：只有当前持久化的
/// `status` 与 `expected` 一致时补丁才会落盘，否则返回 `None`，由调用方
/// 决定如何向用户报告竞争失败。
#[async_trait]
pub trait LessonRepository: Send + Sync {
    async fn create(&self, lesson: Lesson) -> Result<Lesson>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Lesson>>;
    async fn query_by_status(&self, statuses: &[LessonStatus]) -> Result<Vec<Lesson>>;
    /// 单一状态 + 定时发布到期的范围查询（扫描任务按状态逐个调用后合并）
    async fn query_due_for_publish(
        &self,
        status: LessonStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Lesson>>;
    async fn query_by_professor(&self, professor_id: &str) -> Result<Vec<Lesson>>;
    async fn conditional_update(
        &self,
        id: &str,
        expected: LessonStatus,
        patch: LessonPatch,
    ) -> Result<Option<Lesson>>;
}

/// 认领申请仓库契约
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, request: ReservationRequest) -> Result<ReservationRequest>;
    /// 同一教师在该课程上未被驳回的申请（pending/approved）
    async fn find_active(
        &self,
        lesson_id: &str,
        professor_id: &str,
    ) -> Result<Vec<ReservationRequest>>;
    async fn find_pending_for_lesson(&self, lesson_id: &str) -> Result<Option<ReservationRequest>>;
    /// 将 pending 申请标记为 approved/rejected；申请只能被裁决一次
    async fn resolve(
        &self,
        id: &str,
        status: ReservationStatus,
        decided_by_id: &str,
    ) -> Result<Option<ReservationRequest>>;
}

/// 灵修短文仓库契约
#[async_trait]
pub trait DevotionalRepository: Send + Sync {
    async fn create(&self, devotional: Devotional) -> Result<Devotional>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Devotional>>;
    async fn query_by_status(&self, statuses: &[DevotionalStatus]) -> Result<Vec<Devotional>>;
    async fn query_due_for_publish(
        &self,
        status: DevotionalStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Devotional>>;
    async fn conditional_update(
        &self,
        id: &str,
        expected: DevotionalStatus,
        patch: DevotionalPatch,
    ) -> Result<Option<Devotional>>;
}

/// 通知仓库契约；通知记录创建后只有已读状态可变
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: Notification) -> Result<Notification>;
    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>>;
    async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<Option<Notification>>;
    async fn mark_all_read(&self, recipient_id: &str) -> Result<()>;
    async fn unread_count(&self, recipient_id: &str) -> Result<usize>;
}

/// 用户目录契约（档案由平台注册流程维护，这里只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_approved_user_ids(&self) -> Result<Vec<String>>;
    async fn list_coordinator_and_admin_ids(&self) -> Result<Vec<String>>;
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

// ---------------------------------------------------------------------------
// SurrealDB 实现
// ---------------------------------------------------------------------------

pub struct SurrealLessonRepository {
    db: Arc<Database>,
}

impl SurrealLessonRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LessonRepository for SurrealLessonRepository {
    async fn create(&self, lesson: Lesson) -> Result<Lesson> {
        self.db.create("lesson", lesson).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lesson>> {
        self.db.get_by_id("lesson", id).await
    }

    async fn query_by_status(&self, statuses: &[LessonStatus]) -> Result<Vec<Lesson>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM lesson WHERE status IN $statuses ORDER BY lesson_date ASC",
                json!({ "statuses": statuses }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn query_due_for_publish(
        &self,
        status: LessonStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        // 后端限制：不等式过滤 (scheduled_publish_at <= $before) 不能与
        // 多状态 IN 过滤合并到一条查询，因此这里只接受单一状态。
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM lesson \
                 WHERE status = $status \
                 AND scheduled_publish_at != NONE \
                 AND scheduled_publish_at <= $before",
                json!({ "status": status.as_str(), "before": before }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn query_by_professor(&self, professor_id: &str) -> Result<Vec<Lesson>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM lesson \
                 WHERE reserved_professor_id = $professor_id \
                 ORDER BY lesson_date ASC",
                json!({ "professor_id": professor_id }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: LessonStatus,
        patch: LessonPatch,
    ) -> Result<Option<Lesson>> {
        debug!("Conditional update on lesson {} (expected: {})", id, expected.as_str());

        // 乐观并发：WHERE 子句编码了前置状态，竞争失败时结果集为空
        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('lesson', $id) MERGE $patch \
                 WHERE status = $expected RETURN AFTER",
                json!({
                    "id": id,
                    "expected": expected.as_str(),
                    "patch": patch,
                }),
            )
            .await?;
        let updated: Vec<Lesson> = response.take(0)?;
        Ok(updated.into_iter().next())
    }
}

pub struct SurrealReservationRepository {
    db: Arc<Database>,
}

impl SurrealReservationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReservationRepository for SurrealReservationRepository {
    async fn create(&self, request: ReservationRequest) -> Result<ReservationRequest> {
        self.db.create("reservation_request", request).await
    }

    async fn find_active(
        &self,
        lesson_id: &str,
        professor_id: &str,
    ) -> Result<Vec<ReservationRequest>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM reservation_request \
                 WHERE lesson_id = $lesson_id \
                 AND professor_id = $professor_id \
                 AND status IN ['pending', 'approved']",
                json!({ "lesson_id": lesson_id, "professor_id": professor_id }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn find_pending_for_lesson(&self, lesson_id: &str) -> Result<Option<ReservationRequest>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM reservation_request \
                 WHERE lesson_id = $lesson_id AND status = 'pending' \
                 ORDER BY created_at DESC LIMIT 1",
                json!({ "lesson_id": lesson_id }),
            )
            .await?;
        let requests: Vec<ReservationRequest> = response.take(0)?;
        Ok(requests.into_iter().next())
    }

    async fn resolve(
        &self,
        id: &str,
        status: ReservationStatus,
        decided_by_id: &str,
    ) -> Result<Option<ReservationRequest>> {
        // 只允许裁决一次：WHERE status = 'pending'
        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('reservation_request', $id) \
                 SET status = $status, decided_by_id = $decided_by_id, \
                     decided_at = $now, updated_at = $now \
                 WHERE status = 'pending' RETURN AFTER",
                json!({
                    "id": id,
                    "status": status.as_str(),
                    "decided_by_id": decided_by_id,
                    "now": Utc::now(),
                }),
            )
            .await?;
        let updated: Vec<ReservationRequest> = response.take(0)?;
        Ok(updated.into_iter().next())
    }
}

pub struct SurrealDevotionalRepository {
    db: Arc<Database>,
}

impl SurrealDevotionalRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DevotionalRepository for SurrealDevotionalRepository {
    async fn create(&self, devotional: Devotional) -> Result<Devotional> {
        self.db.create("devotional", devotional).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Devotional>> {
        self.db.get_by_id("devotional", id).await
    }

    async fn query_by_status(&self, statuses: &[DevotionalStatus]) -> Result<Vec<Devotional>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM devotional WHERE status IN $statuses ORDER BY devotional_date ASC",
                json!({ "statuses": statuses }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn query_due_for_publish(
        &self,
        status: DevotionalStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Devotional>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM devotional \
                 WHERE status = $status \
                 AND scheduled_publish_at != NONE \
                 AND scheduled_publish_at <= $before",
                json!({ "status": status.as_str(), "before": before }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: DevotionalStatus,
        patch: DevotionalPatch,
    ) -> Result<Option<Devotional>> {
        debug!("Conditional update on devotional {} (expected: {})", id, expected.as_str());

        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('devotional', $id) MERGE $patch \
                 WHERE status = $expected RETURN AFTER",
                json!({
                    "id": id,
                    "expected": expected.as_str(),
                    "patch": patch,
                }),
            )
            .await?;
        let updated: Vec<Devotional> = response.take(0)?;
        Ok(updated.into_iter().next())
    }
}

pub struct SurrealNotificationRepository {
    db: Arc<Database>,
}

impl SurrealNotificationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepository for SurrealNotificationRepository {
    async fn create(&self, notification: Notification) -> Result<Notification> {
        self.db.create("notification", notification).await
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM notification \
                 WHERE recipient_id = $recipient_id \
                 ORDER BY created_at DESC LIMIT 100",
                json!({ "recipient_id": recipient_id }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<Option<Notification>> {
        // recipient 条件防止用户操作他人的通知
        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('notification', $id) \
                 SET is_read = true, read_at = $now \
                 WHERE recipient_id = $recipient_id RETURN AFTER",
                json!({ "id": id, "recipient_id": recipient_id, "now": Utc::now() }),
            )
            .await?;
        let updated: Vec<Notification> = response.take(0)?;
        Ok(updated.into_iter().next())
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<()> {
        self.db
            .query_with_params(
                "UPDATE notification SET is_read = true, read_at = $now \
                 WHERE recipient_id = $recipient_id AND is_read = false",
                json!({ "recipient_id": recipient_id, "now": Utc::now() }),
            )
            .await?;
        Ok(())
    }

    async fn unread_count(&self, recipient_id: &str) -> Result<usize> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT count() AS count FROM notification \
                 WHERE recipient_id = $recipient_id AND is_read = false \
                 GROUP ALL",
                json!({ "recipient_id": recipient_id }),
            )
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.first().map(|r| r.count as usize).unwrap_or(0))
    }
}

pub struct SurrealUserDirectory {
    db: Arc<Database>,
}

impl SurrealUserDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for SurrealUserDirectory {
    async fn list_approved_user_ids(&self) -> Result<Vec<String>> {
        let mut response = self
            .db
            .query("SELECT id FROM user_profile WHERE account_status = 'approved'")
            .await?;
        let rows: Vec<IdRow> = response.take(0)?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn list_coordinator_and_admin_ids(&self) -> Result<Vec<String>> {
        let mut response = self
            .db
            .query(
                "SELECT id FROM user_profile \
                 WHERE account_status = 'approved' AND role IN ['coordinator', 'admin']",
            )
            .await?;
        let rows: Vec<IdRow> = response.take(0)?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.db.get_by_id("user_profile", user_id).await
    }
}
