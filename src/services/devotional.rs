use crate::{
    error::{AppError, Result},
    models::{
        devotional::{CreateDevotionalRequest, Devotional, DevotionalPatch, DevotionalStatus},
        notification::NotificationEvent,
    },
    services::{repository::DevotionalRepository, NotificationService},
    utils::sanitize,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// 灵修短文服务
///
/// 比课程简单得多：没有认领环节，草稿直接发布或等定时扫描发布。
/// 发布路径与课程共用同一套条件更新约定。
#[derive(Clone)]
pub struct DevotionalService {
    devotionals: Arc<dyn DevotionalRepository>,
    notification_service: NotificationService,
}

impl DevotionalService {
    pub fn new(
        devotionals: Arc<dyn DevotionalRepository>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            devotionals,
            notification_service,
        }
    }

    pub async fn create_devotional(
        &self,
        creator_id: &str,
        request: CreateDevotionalRequest,
    ) -> Result<Devotional> {
        debug!("Creating devotional draft for user: {}", creator_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut devotional = Devotional::new(
            request.title,
            sanitize::clean_rich_text(&request.content),
            request.devotional_date,
            creator_id.to_string(),
        );
        devotional.scripture_reference = request.scripture_reference;
        devotional.scheduled_publish_at = request.scheduled_publish_at;

        let created = self.devotionals.create(devotional).await?;

        info!("Created devotional draft: {} by user: {}", created.id, creator_id);
        Ok(created)
    }

    /// 手动发布 (draft -> published)
    pub async fn publish_now(&self, devotional_id: &str, caller_id: &str) -> Result<Devotional> {
        debug!("Publishing devotional {} (requested by {})", devotional_id, caller_id);

        let devotional = self.get_devotional(devotional_id).await?;
        if devotional.status == DevotionalStatus::Published {
            return Err(AppError::AlreadyPublished(
                "Devotional is already published".to_string(),
            ));
        }
        if devotional.status != DevotionalStatus::Draft {
            return Err(AppError::InvalidState(format!(
                "Devotional cannot be published from status '{}'",
                devotional.status.as_str()
            )));
        }

        let updated = match self
            .devotionals
            .conditional_update(devotional_id, DevotionalStatus::Draft, publish_patch(Utc::now()))
            .await?
        {
            Some(updated) => updated,
            None => {
                let current = self.get_devotional(devotional_id).await?;
                if current.status == DevotionalStatus::Published {
                    return Err(AppError::AlreadyPublished(
                        "Devotional was just published by another actor".to_string(),
                    ));
                }
                return Err(AppError::invalid_state("Devotional state changed, please refresh"));
            }
        };

        self.spawn_fan_out(NotificationEvent::new_devotional(&updated.id, &updated.title));

        info!("Devotional {} published by {}", devotional_id, caller_id);
        Ok(updated)
    }

    /// 定时发布（系统路径，仅供扫描任务调用）
    pub(crate) async fn auto_publish(
        &self,
        devotional: &Devotional,
        now: DateTime<Utc>,
    ) -> Result<Option<Devotional>> {
        match self
            .devotionals
            .conditional_update(&devotional.id, devotional.status, publish_patch(now))
            .await?
        {
            Some(updated) => {
                if let Err(e) = self
                    .notification_service
                    .fan_out(NotificationEvent::new_devotional(&updated.id, &updated.title))
                    .await
                {
                    warn!("Fan-out failed after auto-publishing devotional {}: {}", updated.id, e);
                }
                info!("Devotional {} auto-published", updated.id);
                Ok(Some(updated))
            }
            None => {
                debug!("Auto-publish lost the race on devotional {}, skipping", devotional.id);
                Ok(None)
            }
        }
    }

    pub async fn archive(&self, devotional_id: &str) -> Result<Devotional> {
        debug!("Archiving devotional {}", devotional_id);

        let devotional = self.get_devotional(devotional_id).await?;
        if devotional.status != DevotionalStatus::Published {
            return Err(AppError::InvalidState(format!(
                "Only published devotionals can be archived (status: '{}')",
                devotional.status.as_str()
            )));
        }

        let patch = DevotionalPatch {
            status: Some(DevotionalStatus::Archived),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .devotionals
            .conditional_update(devotional_id, DevotionalStatus::Published, patch)
            .await?
            .ok_or_else(|| AppError::invalid_state("Devotional state changed, please refresh"))?;

        info!("Devotional {} archived", devotional_id);
        Ok(updated)
    }

    pub async fn get_devotional(&self, devotional_id: &str) -> Result<Devotional> {
        self.devotionals
            .get_by_id(devotional_id)
            .await?
            .ok_or_else(|| AppError::not_found("Devotional"))
    }

    pub async fn list_published(&self) -> Result<Vec<Devotional>> {
        self.devotionals
            .query_by_status(&[DevotionalStatus::Published])
            .await
    }

    pub async fn list_drafts(&self) -> Result<Vec<Devotional>> {
        self.devotionals
            .query_by_status(&[DevotionalStatus::Draft])
            .await
    }

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
}

fn publish_patch(now: DateTime<Utc>) -> DevotionalPatch {
    DevotionalPatch {
        status: Some(DevotionalStatus::Published),
        published_at: Some(now),
        scheduled_publish_at: Some(None),
        updated_at: Some(now),
        ..Default::default()
    }
}
