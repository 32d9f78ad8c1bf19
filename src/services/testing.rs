//! 单元测试用的内存仓库实现
//!
//! `conditional_update` 在互斥锁内完成读-比较-写，与 SurrealDB 实现的
//! 单语句条件更新提供同样的原子性，可以真实复现并发竞争场景。

use crate::{
    error::{AppError, Result},
    models::{
        devotional::{Devotional, DevotionalPatch, DevotionalStatus},
        lesson::{Lesson, LessonPatch, LessonStatus},
        notification::Notification,
        reservation::{ReservationRequest, ReservationStatus},
        user::{AccountStatus, UserProfile, UserRole},
    },
    services::repository::{
        DevotionalRepository, LessonRepository, NotificationRepository, ReservationRepository,
        UserDirectory,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryLessonRepository {
    lessons: Mutex<HashMap<String, Lesson>>,
}

impl MemoryLessonRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, lesson: Lesson) {
        self.lessons.lock().unwrap().insert(lesson.id.clone(), lesson);
    }

    pub fn get(&self, id: &str) -> Option<Lesson> {
        self.lessons.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl LessonRepository for MemoryLessonRepository {
    async fn create(&self, lesson: Lesson) -> Result<Lesson> {
        self.insert(lesson.clone());
        Ok(lesson)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lesson>> {
        Ok(self.get(id))
    }

    async fn query_by_status(&self, statuses: &[LessonStatus]) -> Result<Vec<Lesson>> {
        let lessons = self.lessons.lock().unwrap();
        let mut found: Vec<Lesson> = lessons
            .values()
            .filter(|l| statuses.contains(&l.status))
            .cloned()
            .collect();
        found.sort_by_key(|l| l.lesson_date);
        Ok(found)
    }

    async fn query_due_for_publish(
        &self,
        status: LessonStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        let lessons = self.lessons.lock().unwrap();
        Ok(lessons
            .values()
            .filter(|l| l.status == status)
            .filter(|l| l.scheduled_publish_at.map_or(false, |at| at <= before))
            .cloned()
            .collect())
    }

    async fn query_by_professor(&self, professor_id: &str) -> Result<Vec<Lesson>> {
        let lessons = self.lessons.lock().unwrap();
        let mut found: Vec<Lesson> = lessons
            .values()
            .filter(|l| l.reserved_professor_id.as_deref() == Some(professor_id))
            .cloned()
            .collect();
        found.sort_by_key(|l| l.lesson_date);
        Ok(found)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: LessonStatus,
        patch: LessonPatch,
    ) -> Result<Option<Lesson>> {
        let mut lessons = self.lessons.lock().unwrap();
        match lessons.get_mut(id) {
            Some(lesson) if lesson.status == expected => {
                patch.apply(lesson);
                Ok(Some(lesson.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// 包装仓库，对指定ID的条件更新注入故障，用于验证扫描任务的失败隔离
pub struct FailingLessonRepository {
    inner: MemoryLessonRepository,
    fail_ids: HashSet<String>,
}

impl FailingLessonRepository {
    pub fn new(inner: MemoryLessonRepository, fail_ids: &[&str]) -> Self {
        Self {
            inner,
            fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Lesson> {
        self.inner.get(id)
    }
}

#[async_trait]
impl LessonRepository for FailingLessonRepository {
    async fn create(&self, lesson: Lesson) -> Result<Lesson> {
        self.inner.create(lesson).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Lesson>> {
        self.inner.get_by_id(id).await
    }

    async fn query_by_status(&self, statuses: &[LessonStatus]) -> Result<Vec<Lesson>> {
        self.inner.query_by_status(statuses).await
    }

    async fn query_due_for_publish(
        &self,
        status: LessonStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        self.inner.query_due_for_publish(status, before).await
    }

    async fn query_by_professor(&self, professor_id: &str) -> Result<Vec<Lesson>> {
        self.inner.query_by_professor(professor_id).await
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: LessonStatus,
        patch: LessonPatch,
    ) -> Result<Option<Lesson>> {
        if self.fail_ids.contains(id) {
            return Err(AppError::ServiceUnavailable(
                "injected repository failure".to_string(),
            ));
        }
        self.inner.conditional_update(id, expected, patch).await
    }
}

#[derive(Default)]
pub struct MemoryReservationRepository {
    requests: Mutex<HashMap<String, ReservationRequest>>,
}

impl MemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ReservationRequest> {
        self.requests.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ReservationRepository for MemoryReservationRepository {
    async fn create(&self, request: ReservationRequest) -> Result<ReservationRequest> {
        self.requests
            .lock()
            .unwrap()
            .insert(request.id.clone(), request.clone());
        Ok(request)
    }

    async fn find_active(
        &self,
        lesson_id: &str,
        professor_id: &str,
    ) -> Result<Vec<ReservationRequest>> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .values()
            .filter(|r| r.lesson_id == lesson_id && r.professor_id == professor_id)
            .filter(|r| r.blocks_new_request())
            .cloned()
            .collect())
    }

    async fn find_pending_for_lesson(&self, lesson_id: &str) -> Result<Option<ReservationRequest>> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .values()
            .filter(|r| r.lesson_id == lesson_id && r.status == ReservationStatus::Pending)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn resolve(
        &self,
        id: &str,
        status: ReservationStatus,
        decided_by_id: &str,
    ) -> Result<Option<ReservationRequest>> {
        let mut requests = self.requests.lock().unwrap();
        match requests.get_mut(id) {
            Some(request) if request.status == ReservationStatus::Pending => {
                let now = Utc::now();
                request.status = status;
                request.decided_by_id = Some(decided_by_id.to_string());
                request.decided_at = Some(now);
                request.updated_at = now;
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryDevotionalRepository {
    devotionals: Mutex<HashMap<String, Devotional>>,
}

impl MemoryDevotionalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, devotional: Devotional) {
        self.devotionals
            .lock()
            .unwrap()
            .insert(devotional.id.clone(), devotional);
    }

    pub fn get(&self, id: &str) -> Option<Devotional> {
        self.devotionals.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl DevotionalRepository for MemoryDevotionalRepository {
    async fn create(&self, devotional: Devotional) -> Result<Devotional> {
        self.insert(devotional.clone());
        Ok(devotional)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Devotional>> {
        Ok(self.get(id))
    }

    async fn query_by_status(&self, statuses: &[DevotionalStatus]) -> Result<Vec<Devotional>> {
        let devotionals = self.devotionals.lock().unwrap();
        let mut found: Vec<Devotional> = devotionals
            .values()
            .filter(|d| statuses.contains(&d.status))
            .cloned()
            .collect();
        found.sort_by_key(|d| d.devotional_date);
        Ok(found)
    }

    async fn query_due_for_publish(
        &self,
        status: DevotionalStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Devotional>> {
        let devotionals = self.devotionals.lock().unwrap();
        Ok(devotionals
            .values()
            .filter(|d| d.status == status)
            .filter(|d| d.scheduled_publish_at.map_or(false, |at| at <= before))
            .cloned()
            .collect())
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected: DevotionalStatus,
        patch: DevotionalPatch,
    ) -> Result<Option<Devotional>> {
        let mut devotionals = self.devotionals.lock().unwrap();
        match devotionals.get_mut(id) {
            Some(devotional) if devotional.status == expected => {
                patch.apply(devotional);
                Ok(Some(devotional.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryNotificationRepository {
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn create(&self, notification: Notification) -> Result<Notification> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(notification)
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        let notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<Option<Notification>> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        {
            Some(notification) => {
                notification.is_read = true;
                notification.read_at = Some(Utc::now());
                Ok(Some(notification.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<()> {
        let mut notifications = self.notifications.lock().unwrap();
        for notification in notifications
            .iter_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
        {
            notification.is_read = true;
            notification.read_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn unread_count(&self, recipient_id: &str) -> Result<usize> {
        let notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count())
    }
}

pub struct MemoryUserDirectory {
    profiles: Vec<UserProfile>,
}

impl MemoryUserDirectory {
    pub fn new(profiles: Vec<UserProfile>) -> Self {
        Self { profiles }
    }
}

/// 构造测试档案
pub fn profile(id: &str, role: UserRole, account_status: AccountStatus) -> UserProfile {
    let now = Utc::now();
    UserProfile {
        id: id.to_string(),
        display_name: id.to_string(),
        role,
        account_status,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_approved_user_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .profiles
            .iter()
            .filter(|p| p.account_status == AccountStatus::Approved)
            .map(|p| p.id.clone())
            .collect())
    }

    async fn list_coordinator_and_admin_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .profiles
            .iter()
            .filter(|p| p.account_status == AccountStatus::Approved)
            .filter(|p| p.role.can_manage_lessons())
            .map(|p| p.id.clone())
            .collect())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.iter().find(|p| p.id == user_id).cloned())
    }
}
