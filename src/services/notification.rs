use crate::{
    error::{AppError, Result},
    models::notification::{Notification, NotificationEvent, NotificationType},
    services::repository::{NotificationRepository, UserDirectory},
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    directory: Arc<dyn UserDirectory>,
    enabled: bool,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            repo,
            directory,
            enabled: true,
        }
    }

    /// 按功能开关决定是否产生通知记录（ENABLE_NOTIFICATIONS）
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 将事件扩散为每个接收者一条通知记录
    ///
    /// 接收者集合由事件类型决定；N 条创建并行执行，单个接收者的失败
    /// 只记日志，不影响其他接收者，也不会回滚触发该事件的状态变更。
    /// 返回实际创建成功的条数。
    pub async fn fan_out(&self, event: NotificationEvent) -> Result<usize> {
        if !self.enabled {
            debug!("Notifications disabled, skipping {:?} fan-out", event.notification_type);
            return Ok(0);
        }

        let recipients = self.resolve_audience(&event).await?;

        debug!(
            "Fanning out {:?} notification to {} recipients",
            event.notification_type,
            recipients.len()
        );

        let creates = recipients.iter().map(|recipient_id| {
            let notification = Notification::new(recipient_id.clone(), &event);
            self.repo.create(notification)
        });

        let mut created = 0;
        for (recipient_id, result) in recipients.iter().zip(join_all(creates).await) {
            match result {
                Ok(_) => created += 1,
                Err(e) => {
                    warn!("Failed to create notification for {}: {}", recipient_id, e);
                }
            }
        }

        info!(
            "Notification fan-out complete: {:?}, {}/{} created",
            event.notification_type,
            created,
            recipients.len()
        );
        Ok(created)
    }

    /// 单接收者通知（审批结果只发给被绑定的教师）
    pub async fn notify_user(&self, recipient_id: &str, event: NotificationEvent) -> Result<Notification> {
        debug!(
            "Creating {:?} notification for user {}",
            event.notification_type, recipient_id
        );
        self.repo
            .create(Notification::new(recipient_id.to_string(), &event))
            .await
    }

    async fn resolve_audience(&self, event: &NotificationEvent) -> Result<Vec<String>> {
        match event.notification_type {
            NotificationType::NewLesson | NotificationType::NewDevotional => {
                self.directory.list_approved_user_ids().await
            }
            NotificationType::NewReservation | NotificationType::NewNotice => {
                self.directory.list_coordinator_and_admin_ids().await
            }
            NotificationType::ReservationApproved | NotificationType::ReservationRejected => {
                // 审批结果是单接收者事件，必须走 notify_user
                Err(AppError::internal(
                    "reservation decision notifications target a single professor",
                ))
            }
        }
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.repo.list_for_recipient(user_id).await
    }

    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<Notification> {
        self.repo
            .mark_read(notification_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        self.repo.mark_all_read(user_id).await
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize> {
        self.repo.unread_count(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{AccountStatus, UserRole};
    use crate::services::repository::{MockUserDirectory, NotificationRepository};
    use crate::services::testing::{profile, MemoryNotificationRepository, MemoryUserDirectory};
    use async_trait::async_trait;

    fn service_with_users(profiles: Vec<crate::models::user::UserProfile>) -> (NotificationService, Arc<MemoryNotificationRepository>) {
        let repo = Arc::new(MemoryNotificationRepository::new());
        let directory = Arc::new(MemoryUserDirectory::new(profiles));
        (NotificationService::new(repo.clone(), directory), repo)
    }

    #[tokio::test]
    async fn test_new_lesson_fans_out_to_approved_users_only() {
        let (service, repo) = service_with_users(vec![
            profile("member-1", UserRole::Member, AccountStatus::Approved),
            profile("prof-1", UserRole::Professor, AccountStatus::Approved),
            profile("pending-1", UserRole::Member, AccountStatus::Pending),
            profile("disabled-1", UserRole::Member, AccountStatus::Disabled),
        ]);

        let created = service
            .fan_out(NotificationEvent::new_lesson("lesson-1", "创世记概览"))
            .await
            .unwrap();

        assert_eq!(created, 2);
        let all = repo.all();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|n| n.notification_type == NotificationType::NewLesson));
        assert!(all.iter().all(|n| n.reference_id.as_deref() == Some("lesson-1")));
        assert!(all.iter().any(|n| n.recipient_id == "member-1"));
        assert!(all.iter().any(|n| n.recipient_id == "prof-1"));
    }

    #[tokio::test]
    async fn test_new_reservation_targets_coordinators_and_admins() {
        let (service, repo) = service_with_users(vec![
            profile("prof-1", UserRole::Professor, AccountStatus::Approved),
            profile("coord-1", UserRole::Coordinator, AccountStatus::Approved),
            profile("admin-1", UserRole::Admin, AccountStatus::Approved),
        ]);

        let created = service
            .fan_out(NotificationEvent::new_reservation("lesson-1", "创世记概览"))
            .await
            .unwrap();

        assert_eq!(created, 2);
        let recipients: Vec<String> = repo.all().into_iter().map(|n| n.recipient_id).collect();
        assert!(recipients.contains(&"coord-1".to_string()));
        assert!(recipients.contains(&"admin-1".to_string()));
        assert!(!recipients.contains(&"prof-1".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_service_creates_nothing() {
        let repo = Arc::new(MemoryNotificationRepository::new());
        let directory = Arc::new(MemoryUserDirectory::new(vec![
            profile("member-1", UserRole::Member, AccountStatus::Approved),
            profile("member-2", UserRole::Member, AccountStatus::Approved),
        ]));
        let service = NotificationService::new(repo.clone(), directory).with_enabled(false);

        let created = service
            .fan_out(NotificationEvent::new_lesson("lesson-1", "创世记概览"))
            .await
            .unwrap();

        assert_eq!(created, 0);
        assert_eq!(repo.count(), 0);
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let repo = Arc::new(MemoryNotificationRepository::new());
        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_approved_user_ids()
            .returning(|| Err(AppError::ServiceUnavailable("directory down".to_string())));

        let service = NotificationService::new(repo.clone(), Arc::new(directory));
        let result = service
            .fan_out(NotificationEvent::new_devotional("dev-1", "晨更"))
            .await;

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
        assert_eq!(repo.count(), 0);
    }

    /// 对部分接收者的创建注入失败
    struct FlakyNotificationRepository {
        inner: MemoryNotificationRepository,
        fail_recipient: String,
    }

    #[async_trait]
    impl NotificationRepository for FlakyNotificationRepository {
        async fn create(&self, notification: Notification) -> Result<Notification> {
            if notification.recipient_id == self.fail_recipient {
                return Err(AppError::ServiceUnavailable("write failed".to_string()));
            }
            self.inner.create(notification).await
        }

        async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>> {
            self.inner.list_for_recipient(recipient_id).await
        }

        async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<Option<Notification>> {
            self.inner.mark_read(id, recipient_id).await
        }

        async fn mark_all_read(&self, recipient_id: &str) -> Result<()> {
            self.inner.mark_all_read(recipient_id).await
        }

        async fn unread_count(&self, recipient_id: &str) -> Result<usize> {
            self.inner.unread_count(recipient_id).await
        }
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_block_other_recipients() {
        let repo = Arc::new(FlakyNotificationRepository {
            inner: MemoryNotificationRepository::new(),
            fail_recipient: "member-2".to_string(),
        });
        let directory = Arc::new(MemoryUserDirectory::new(vec![
            profile("member-1", UserRole::Member, AccountStatus::Approved),
            profile("member-2", UserRole::Member, AccountStatus::Approved),
            profile("member-3", UserRole::Member, AccountStatus::Approved),
        ]));
        let service = NotificationService::new(repo.clone(), directory);

        // 部分失败不报错，返回成功条数
        let created = service
            .fan_out(NotificationEvent::new_lesson("lesson-1", "创世记概览"))
            .await
            .unwrap();

        assert_eq!(created, 2);
        assert_eq!(repo.inner.count(), 2);
    }

    #[tokio::test]
    async fn test_read_state_owned_by_recipient() {
        let (service, _repo) = service_with_users(vec![]);

        let notification = service
            .notify_user(
                "prof-1",
                NotificationEvent::reservation_approved("lesson-1", "创世记概览"),
            )
            .await
            .unwrap();
        assert!(!notification.is_read);

        // 其他用户无法标记
        let result = service.mark_read(&notification.id, "prof-2").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // 本人可以标记
        let marked = service.mark_read(&notification.id, "prof-1").await.unwrap();
        assert!(marked.is_read);
        assert!(marked.read_at.is_some());

        assert_eq!(service.unread_count("prof-1").await.unwrap(), 0);
    }
}
