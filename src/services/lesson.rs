use crate::{
    error::{AppError, Result},
    models::{
        lesson::{
            CreateLessonRequest, Lesson, LessonPatch, LessonStatus, ManagerLessonsResponse,
            SaveComplementRequest,
        },
        notification::NotificationEvent,
        reservation::{ReservationRequest, ReservationStatus},
    },
    services::{
        repository::{LessonRepository, ReservationRepository},
        NotificationService,
    },
    utils::sanitize,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// 课程生命周期状态机
///
/// 所有状态迁移都通过仓库的条件更新落盘：补丁只在持久化状态仍等于
/// 读取时的状态时生效，竞争失败返回 `InvalidState`/`AlreadyPublished`，
/// 由调用方重新读取后决定是否重试。通知扩散只在状态迁移提交之后触发，
/// 交互路径不等待扩散完成。
#[derive(Clone)]
pub struct LessonService {
    lessons: Arc<dyn LessonRepository>,
    reservations: Arc<dyn ReservationRepository>,
    notification_service: NotificationService,
}

impl LessonService {
    pub fn new(
        lessons: Arc<dyn LessonRepository>,
        reservations: Arc<dyn ReservationRepository>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            lessons,
            reservations,
            notification_service,
        }
    }

    /// 创建课程草稿
    pub async fn create_lesson(&self, creator_id: &str, request: CreateLessonRequest) -> Result<Lesson> {
        debug!("Creating lesson draft for user: {}", creator_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut lesson = Lesson::new(
            request.title,
            request.description,
            request.lesson_date,
            creator_id.to_string(),
        );
        lesson.scripture_reference = request.scripture_reference;
        lesson.scheduled_publish_at = request.scheduled_publish_at;

        let created = self.lessons.create(lesson).await?;

        info!("Created lesson draft: {} by user: {}", created.id, creator_id);
        Ok(created)
    }

    /// 开放课程供教师认领 (draft -> available)
    pub async fn open_for_reservation(
        &self,
        lesson_id: &str,
        scheduled_publish_at: Option<DateTime<Utc>>,
    ) -> Result<Lesson> {
        debug!("Opening lesson {} for reservation", lesson_id);

        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.status != LessonStatus::Draft {
            return Err(AppError::InvalidState(format!(
                "Lesson cannot be opened from status '{}'",
                lesson.status.as_str()
            )));
        }

        let patch = LessonPatch {
            status: Some(LessonStatus::Available),
            scheduled_publish_at: scheduled_publish_at.map(Some),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .lessons
            .conditional_update(lesson_id, LessonStatus::Draft, patch)
            .await?
            .ok_or_else(|| AppError::invalid_state("Lesson state changed, please refresh"))?;

        info!("Lesson {} opened for reservation", lesson_id);
        Ok(updated)
    }

    /// 教师申请认领课程 (available -> reservation_pending)
    ///
    /// 并发申请同一课程时由条件更新裁决：恰好一个申请提交成功，
    /// 失败方收到 `InvalidState`，需刷新后重试其他课程。
    pub async fn request_reservation(&self, lesson_id: &str, professor_id: &str) -> Result<Lesson> {
        debug!("Professor {} requesting reservation on lesson {}", professor_id, lesson_id);

        let lesson = self.get_lesson(lesson_id).await?;

        // 重复申请检查先于状态检查，申请人能得到更准确的错误
        let active = self.reservations.find_active(lesson_id, professor_id).await?;
        if !active.is_empty() {
            return Err(AppError::duplicate_request(
                "You already have an active reservation request for this lesson",
            ));
        }

        if lesson.status != LessonStatus::Available {
            return Err(AppError::InvalidState(format!(
                "Lesson is not available for reservation (status: '{}')",
                lesson.status.as_str()
            )));
        }

        let patch = LessonPatch {
            status: Some(LessonStatus::ReservationPending),
            reserved_professor_id: Some(Some(professor_id.to_string())),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .lessons
            .conditional_update(lesson_id, LessonStatus::Available, patch)
            .await?
            .ok_or_else(|| {
                AppError::invalid_state(
                    "This lesson was just claimed by someone else, please refresh",
                )
            })?;

        // 申请记录在状态迁移提交后创建
        let request = ReservationRequest::new(lesson_id.to_string(), professor_id.to_string());
        self.reservations.create(request).await?;

        self.spawn_fan_out(NotificationEvent::new_reservation(&updated.id, &updated.title));

        info!("Reservation requested: lesson {} by professor {}", lesson_id, professor_id);
        Ok(updated)
    }

    /// 审批通过认领申请 (reservation_pending -> reserved)
    pub async fn approve_reservation(&self, lesson_id: &str, authority_id: &str) -> Result<Lesson> {
        debug!("Approving reservation on lesson {} by {}", lesson_id, authority_id);

        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.status != LessonStatus::ReservationPending {
            return Err(AppError::InvalidState(format!(
                "No pending reservation to approve (status: '{}')",
                lesson.status.as_str()
            )));
        }

        let professor_id = lesson
            .reserved_professor_id
            .clone()
            .ok_or_else(|| AppError::internal("Pending lesson has no bound professor"))?;

        let patch = LessonPatch {
            status: Some(LessonStatus::Reserved),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .lessons
            .conditional_update(lesson_id, LessonStatus::ReservationPending, patch)
            .await?
            .ok_or_else(|| AppError::invalid_state("Lesson state changed, please refresh"))?;

        self.resolve_pending_request(lesson_id, ReservationStatus::Approved, authority_id)
            .await;

        self.spawn_notify(
            professor_id.clone(),
            NotificationEvent::reservation_approved(&updated.id, &updated.title),
        );

        info!(
            "Reservation approved: lesson {} -> professor {} (by {})",
            lesson_id, professor_id, authority_id
        );
        Ok(updated)
    }

    /// 驳回认领申请 (reservation_pending -> available)
    pub async fn reject_reservation(&self, lesson_id: &str, authority_id: &str) -> Result<Lesson> {
        debug!("Rejecting reservation on lesson {} by {}", lesson_id, authority_id);

        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.status != LessonStatus::ReservationPending {
            return Err(AppError::InvalidState(format!(
                "No pending reservation to reject (status: '{}')",
                lesson.status.as_str()
            )));
        }

        let professor_id = lesson
            .reserved_professor_id
            .clone()
            .ok_or_else(|| AppError::internal("Pending lesson has no bound professor"))?;

        let patch = LessonPatch {
            status: Some(LessonStatus::Available),
            reserved_professor_id: Some(None),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .lessons
            .conditional_update(lesson_id, LessonStatus::ReservationPending, patch)
            .await?
            .ok_or_else(|| AppError::invalid_state("Lesson state changed, please refresh"))?;

        self.resolve_pending_request(lesson_id, ReservationStatus::Rejected, authority_id)
            .await;

        self.spawn_notify(
            professor_id.clone(),
            NotificationEvent::reservation_rejected(&updated.id, &updated.title),
        );

        info!(
            "Reservation rejected: lesson {} back to available (professor {}, by {})",
            lesson_id, professor_id, authority_id
        );
        Ok(updated)
    }

    /// 保存教师撰写的辅助材料（状态保持 reserved）
    pub async fn save_complement(
        &self,
        lesson_id: &str,
        professor_id: &str,
        request: SaveComplementRequest,
    ) -> Result<Lesson> {
        debug!("Saving complement on lesson {} by professor {}", lesson_id, professor_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.status != LessonStatus::Reserved {
            return Err(AppError::InvalidState(format!(
                "Complement can only be edited on a reserved lesson (status: '{}')",
                lesson.status.as_str()
            )));
        }
        if lesson.reserved_professor_id.as_deref() != Some(professor_id) {
            return Err(AppError::forbidden(
                "Only the professor who reserved this lesson can edit its complement",
            ));
        }

        let now = Utc::now();
        let patch = LessonPatch {
            complement: Some(sanitize::clean_rich_text(&request.complement)),
            draft_saved_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        };

        let updated = self
            .lessons
            .conditional_update(lesson_id, LessonStatus::Reserved, patch)
            .await?
            .ok_or_else(|| AppError::invalid_state("Lesson state changed, please refresh"))?;

        info!("Complement saved on lesson {}", lesson_id);
        Ok(updated)
    }

    /// 手动发布 (draft|available|reserved -> published)
    pub async fn publish_now(&self, lesson_id: &str, caller_id: &str) -> Result<Lesson> {
        debug!("Publishing lesson {} (requested by {})", lesson_id, caller_id);

        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.status == LessonStatus::Published {
            return Err(AppError::AlreadyPublished(
                "Lesson is already published".to_string(),
            ));
        }
        if !lesson.status.can_publish() {
            return Err(AppError::InvalidState(format!(
                "Lesson cannot be published from status '{}'",
                lesson.status.as_str()
            )));
        }

        let updated = match self
            .lessons
            .conditional_update(lesson_id, lesson.status, publish_patch(Utc::now()))
            .await?
        {
            Some(updated) => updated,
            None => {
                // 竞争失败：重新读取以区分「刚被发布」和其他状态变化
                let current = self.get_lesson(lesson_id).await?;
                if current.status == LessonStatus::Published {
                    return Err(AppError::AlreadyPublished(
                        "Lesson was just published by another actor".to_string(),
                    ));
                }
                return Err(AppError::invalid_state("Lesson state changed, please refresh"));
            }
        };

        self.spawn_fan_out(NotificationEvent::new_lesson(&updated.id, &updated.title));

        info!("Lesson {} published by {}", lesson_id, caller_id);
        Ok(updated)
    }

    /// 定时发布（系统路径，仅供扫描任务调用）
    ///
    /// 与手动发布竞争时先提交者获胜；竞争失败是预期情况，返回
    /// `Ok(None)` 而不是错误。通知扩散在此路径内等待完成，保证
    /// 扫描汇总的计数有意义。
    pub(crate) async fn auto_publish(&self, lesson: &Lesson, now: DateTime<Utc>) -> Result<Option<Lesson>> {
        match self
            .lessons
            .conditional_update(&lesson.id, lesson.status, publish_patch(now))
            .await?
        {
            Some(updated) => {
                if let Err(e) = self
                    .notification_service
                    .fan_out(NotificationEvent::new_lesson(&updated.id, &updated.title))
                    .await
                {
                    warn!("Fan-out failed after auto-publishing lesson {}: {}", updated.id, e);
                }
                info!("Lesson {} auto-published", updated.id);
                Ok(Some(updated))
            }
            None => {
                debug!("Auto-publish lost the race on lesson {}, skipping", lesson.id);
                Ok(None)
            }
        }
    }

    /// 归档已发布的课程
    pub async fn archive(&self, lesson_id: &str) -> Result<Lesson> {
        debug!("Archiving lesson {}", lesson_id);

        let lesson = self.get_lesson(lesson_id).await?;
        if lesson.status != LessonStatus::Published {
            return Err(AppError::InvalidState(format!(
                "Only published lessons can be archived (status: '{}')",
                lesson.status.as_str()
            )));
        }

        let patch = LessonPatch {
            status: Some(LessonStatus::Archived),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .lessons
            .conditional_update(lesson_id, LessonStatus::Published, patch)
            .await?
            .ok_or_else(|| AppError::invalid_state("Lesson state changed, please refresh"))?;

        info!("Lesson {} archived", lesson_id);
        Ok(updated)
    }

    pub async fn get_lesson(&self, lesson_id: &str) -> Result<Lesson> {
        self.lessons
            .get_by_id(lesson_id)
            .await?
            .ok_or_else(|| AppError::not_found("Lesson"))
    }

    /// 可认领课程列表
    pub async fn list_available(&self) -> Result<Vec<Lesson>> {
        self.lessons.query_by_status(&[LessonStatus::Available]).await
    }

    /// 教师名下（已绑定）的课程
    pub async fn list_for_professor(&self, professor_id: &str) -> Result<Vec<Lesson>> {
        self.lessons.query_by_professor(professor_id).await
    }

    /// 协调员管理视图
    pub async fn list_for_manager(&self) -> Result<ManagerLessonsResponse> {
        let drafts = self.lessons.query_by_status(&[LessonStatus::Draft]).await?;
        let in_preparation = self
            .lessons
            .query_by_status(&[LessonStatus::ReservationPending, LessonStatus::Reserved])
            .await?;

        Ok(ManagerLessonsResponse { drafts, in_preparation })
    }

    pub async fn list_published(&self) -> Result<Vec<Lesson>> {
        self.lessons.query_by_status(&[LessonStatus::Published]).await
    }

    /// 裁决课程上的 pending 申请；申请缺失只记日志，不影响已提交的迁移
    async fn resolve_pending_request(
        &self,
        lesson_id: &str,
        status: ReservationStatus,
        decided_by_id: &str,
    ) {
        match self.reservations.find_pending_for_lesson(lesson_id).await {
            Ok(Some(request)) => {
                if let Err(e) = self
                    .reservations
                    .resolve(&request.id, status, decided_by_id)
                    .await
                {
                    warn!("Failed to resolve reservation request {}: {}", request.id, e);
                }
            }
            Ok(None) => {
                warn!("No pending reservation request found for lesson {}", lesson_id);
            }
            Err(e) => {
                warn!("Failed to look up reservation request for lesson {}: {}", lesson_id, e);
            }
        }
    }

    /// 交互路径的通知扩散：不等待完成，失败只记日志
    fn spawn_fan_out(&self, event: NotificationEvent) {
        if !self.notification_service.is_enabled() {
            return;
        }
        let notification_service = self.notification_service.clone();
        tokio::spawn(async move {
            if let Err(e) = notification_service.fan_out(event).await {
                error!("Notification fan-out failed: {}", e);
            }
        });
    }

    fn spawn_notify(&self, recipient_id: String, event: NotificationEvent) {
        if !self.notification_service.is_enabled() {
            return;
        }
        let notification_service = self.notification_service.clone();
        tokio::spawn(async move {
            if let Err(e) = notification_service.notify_user(&recipient_id, event).await {
                error!("Failed to notify user {}: {}", recipient_id, e);
            }
        });
    }
}

fn publish_patch(now: DateTime<Utc>) -> LessonPatch {
    LessonPatch {
        status: Some(LessonStatus::Published),
        published_at: Some(now),
        // 清空定时发布时间，保证扫描任务幂等
        scheduled_publish_at: Some(None),
        updated_at: Some(now),
        ..Default::default()
    }
}
