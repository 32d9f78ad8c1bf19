use crate::{
    error::Result,
    models::{devotional::DevotionalStatus, lesson::LessonStatus},
    services::{
        repository::{DevotionalRepository, LessonRepository},
        DevotionalService, LessonService,
    },
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

/// 一轮扫描的汇总
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// 查出的到期记录数
    pub examined: usize,
    /// 本轮实际完成发布的记录数
    pub published: usize,
    /// 发布尝试出错的记录数（竞争失败不算错）
    pub failed: usize,
}

/// 定时发布扫描
///
/// 每轮独立处理每条到期记录：单条失败只记日志并计入汇总，不中断
/// 本轮其余记录。与手动发布的竞争由条件更新裁决，扫描输掉竞争时
/// 静默跳过。发布补丁会清空 scheduled_publish_at，因此重复扫描是
/// 幂等的。
#[derive(Clone)]
pub struct PublicationScheduler {
    lessons: Arc<dyn LessonRepository>,
    devotionals: Arc<dyn DevotionalRepository>,
    lesson_service: LessonService,
    devotional_service: DevotionalService,
}

impl PublicationScheduler {
    pub fn new(
        lessons: Arc<dyn LessonRepository>,
        devotionals: Arc<dyn DevotionalRepository>,
        lesson_service: LessonService,
        devotional_service: DevotionalService,
    ) -> Self {
        Self {
            lessons,
            devotionals,
            lesson_service,
            devotional_service,
        }
    }

    /// 执行一轮扫描
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let now = Utc::now();
        let mut summary = SweepSummary::default();

        // 到期查询按状态逐个执行后在这里合并；单个状态的查询失败
        // 只计入汇总，不影响其他状态的处理
        let mut due_lessons = Vec::new();
        for status in LessonStatus::sweep_candidates().iter().copied() {
            match self.lessons.query_due_for_publish(status, now).await {
                Ok(found) => due_lessons.extend(found),
                Err(e) => {
                    summary.failed += 1;
                    error!("Due-lesson query failed for status '{}': {}", status.as_str(), e);
                }
            }
        }

        let due_devotionals = match self
            .devotionals
            .query_due_for_publish(DevotionalStatus::Draft, now)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                summary.failed += 1;
                error!("Due-devotional query failed: {}", e);
                Vec::new()
            }
        };

        summary.examined = due_lessons.len() + due_devotionals.len();

        // 所有到期记录的发布尝试并行执行，最后统一汇总；慢记录不会
        // 拖住同一轮里的其他记录
        let lesson_results = join_all(
            due_lessons
                .iter()
                .map(|lesson| self.lesson_service.auto_publish(lesson, now)),
        )
        .await;
        for (lesson, result) in due_lessons.iter().zip(lesson_results) {
            match result {
                Ok(Some(_)) => summary.published += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.failed += 1;
                    error!("Auto-publish failed for lesson {}: {}", lesson.id, e);
                }
            }
        }

        let devotional_results = join_all(
            due_devotionals
                .iter()
                .map(|devotional| self.devotional_service.auto_publish(devotional, now)),
        )
        .await;
        for (devotional, result) in due_devotionals.iter().zip(devotional_results) {
            match result {
                Ok(Some(_)) => summary.published += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.failed += 1;
                    error!("Auto-publish failed for devotional {}: {}", devotional.id, e);
                }
            }
        }

        if summary.examined > 0 || summary.failed > 0 {
            info!(
                "Publication sweep: {} examined, {} published, {} failed",
                summary.examined, summary.published, summary.failed
            );
        }

        Ok(summary)
    }
}
