//! Task service - ties extraction, storage and reminders together.
//!
//! Every mutation writes to the store first and only then touches the
//! scheduler, so a timer never fires for a task the store has not seen.
//! Mutations hold the service write lock from the store read through the
//! scheduler call, so the pending reminder always matches the last write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use tickler_core::{FieldUpdate, Task, TaskId, TaskPatch};
use tickler_extract::ExtractionCascade;

use crate::scheduler::{Clock, ReminderScheduler, SystemClock};
use crate::store::{StoreError, TaskStore, TaskUpdate};

/// Task service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Structured fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub due_instant: Option<DateTime<Utc>>,
    pub notify_target: Option<String>,
}

/// An edit to an existing task.
///
/// When `text` is set it is run through extraction and its title and due
/// instant replace whatever `patch` says about those two fields.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub text: Option<String>,
    pub patch: TaskPatch,
}

impl TaskEdit {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            patch: TaskPatch::default(),
        }
    }

    pub fn fields(patch: TaskPatch) -> Self {
        Self { text: None, patch }
    }
}

/// Task operations exposed to the API.
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    scheduler: ReminderScheduler,
    cascade: Arc<ExtractionCascade>,
    zone: Tz,
    clock: Arc<dyn Clock>,
    writes: Mutex<()>,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: ReminderScheduler,
        cascade: Arc<ExtractionCascade>,
        zone: Tz,
    ) -> Self {
        Self {
            store,
            scheduler,
            cascade,
            zone,
            clock: Arc::new(SystemClock),
            writes: Mutex::new(()),
        }
    }

    /// Use a custom clock as the extraction reference instant.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a task from free text.
    pub async fn create_from_text(
        &self,
        text: &str,
        notify_target: Option<String>,
    ) -> Result<Task, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::InvalidInput("task text is required".into()));
        }

        let parsed = self.cascade.extract(text, self.clock.now(), self.zone).await;
        let mut task = Task::from_parse(parsed);
        task.notify_target = notify_target;

        self.insert(task).await
    }

    /// Create a task from structured fields.
    pub async fn create(&self, fields: NewTask) -> Result<Task, ServiceError> {
        let title = fields.title.trim();
        if title.is_empty() {
            return Err(ServiceError::InvalidInput("task title is required".into()));
        }

        let mut task = Task::new(title, fields.due_instant);
        task.notify_target = fields.notify_target;

        self.insert(task).await
    }

    async fn insert(&self, task: Task) -> Result<Task, ServiceError> {
        let _guard = self.writes.lock().await;
        let task = self.store.create(task).await?;
        info!(task_id = %task.id, title = %task.title, due = ?task.due_instant, "Task created");
        self.scheduler.schedule(&task);
        Ok(task)
    }

    /// Apply an edit and re-arm the reminder if timing changed.
    pub async fn update(&self, id: &TaskId, edit: TaskEdit) -> Result<Task, ServiceError> {
        let mut patch = edit.patch;

        if let Some(title) = patch.title.take() {
            let title = title.trim();
            if title.is_empty() {
                return Err(ServiceError::InvalidInput("task title cannot be empty".into()));
            }
            patch.title = Some(title.to_string());
        }

        if let Some(text) = edit.text {
            if text.trim().is_empty() {
                return Err(ServiceError::InvalidInput("task text cannot be empty".into()));
            }
            let parsed = self.cascade.extract(&text, self.clock.now(), self.zone).await;
            patch.title = Some(parsed.title);
            patch.due_instant = FieldUpdate::from_nullable(parsed.due_instant);
        }

        let _guard = self.writes.lock().await;
        if patch.is_empty() {
            return self.get(id).await;
        }

        let TaskUpdate {
            task,
            timing_changed,
        } = self.store.update(id, patch).await?;

        info!(task_id = %task.id, timing_changed, "Task updated");
        if timing_changed {
            self.scheduler.reschedule(&task);
        }
        Ok(task)
    }

    /// Flip the completion flag.
    pub async fn toggle(&self, id: &TaskId) -> Result<Task, ServiceError> {
        let _guard = self.writes.lock().await;
        let current = self.get(id).await?;
        let TaskUpdate { task, .. } = self
            .store
            .update(id, TaskPatch::completed(!current.completed))
            .await?;

        info!(task_id = %task.id, completed = task.completed, "Task toggled");
        self.scheduler.reschedule(&task);
        Ok(task)
    }

    /// Delete a task and drop its reminder.
    pub async fn delete(&self, id: &TaskId) -> Result<(), ServiceError> {
        let _guard = self.writes.lock().await;
        self.store.delete(id).await?;
        self.scheduler.cancel(id);
        info!(task_id = %id, "Task deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FixedClock, ReminderSink, SchedulerConfig};
    use crate::store::InMemoryTaskStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tickler_extract::LocalExtractor;
    use tokio::sync::Notify;

    struct NullSink;

    #[async_trait]
    impl ReminderSink for NullSink {
        async fn deliver(&self, _task: &Task, _due_instant: DateTime<Utc>) {}
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    /// Store whose next update is applied and then held until released.
    #[derive(Default)]
    struct GatedStore {
        tasks: InMemoryTaskStore,
        hold_next_update: AtomicBool,
        applied: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TaskStore for GatedStore {
        async fn list(&self) -> Result<Vec<Task>, StoreError> {
            self.tasks.list().await
        }

        async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
            self.tasks.get(id).await
        }

        async fn create(&self, task: Task) -> Result<Task, StoreError> {
            self.tasks.create(task).await
        }

        async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<TaskUpdate, StoreError> {
            let result = self.tasks.update(id, patch).await;
            if self.hold_next_update.swap(false, Ordering::SeqCst) {
                self.applied.notify_one();
                self.release.notified().await;
            }
            result
        }

        async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
            self.tasks.delete(id).await
        }
    }

    fn due_edit(due: DateTime<Utc>) -> TaskEdit {
        TaskEdit::fields(TaskPatch {
            due_instant: FieldUpdate::Set(due),
            ..Default::default()
        })
    }

    fn service() -> TaskService {
        service_on(Arc::new(InMemoryTaskStore::new()))
    }

    fn service_on(store: Arc<dyn TaskStore>) -> TaskService {
        let clock = Arc::new(FixedClock::new(t0()));
        let scheduler = ReminderScheduler::with_clock(
            SchedulerConfig::default(),
            store.clone(),
            Arc::new(NullSink),
            clock.clone(),
        );
        let cascade = Arc::new(ExtractionCascade::new(LocalExtractor::default()));
        TaskService::new(store, scheduler, cascade, Tz::UTC).with_clock(clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_from_text_stores_and_arms() {
        let service = service();
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();

        assert_eq!(task.title, "Call mom");
        assert_eq!(task.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()));
        assert_eq!(service.get(&task.id).await.unwrap(), task);

        let pending = service.scheduler().pending(&task.id).unwrap();
        assert_eq!(pending.fire_at, Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let service = service();
        assert!(matches!(
            service.create_from_text("   ", None).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.create(NewTask::default()).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_cancels_and_rearms() {
        let service = service();
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();
        let first = service.scheduler().pending(&task.id).unwrap().generation;

        let done = service.toggle(&task.id).await.unwrap();
        assert!(done.completed);
        assert!(service.scheduler().pending(&task.id).is_none());

        let reopened = service.toggle(&task.id).await.unwrap();
        assert!(!reopened.completed);
        assert!(service.scheduler().pending(&task.id).unwrap().generation > first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_with_text_re_extracts() {
        let service = service();
        let task = service
            .create(NewTask {
                title: "draft".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(service.scheduler().pending(&task.id).is_none());

        let updated = service
            .update(&task.id, TaskEdit::text("Submit report in 3 hours"))
            .await
            .unwrap();

        assert_eq!(updated.title, "Submit report");
        assert_eq!(updated.due_instant, Some(t0() + chrono::Duration::hours(3)));
        assert_eq!(
            service.scheduler().pending(&task.id).unwrap().fire_at,
            t0() + chrono::Duration::hours(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_due_date_cancels_reminder() {
        let service = service();
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();

        service
            .update(
                &task.id,
                TaskEdit::fields(TaskPatch {
                    due_instant: FieldUpdate::Clear,
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        assert_eq!(service.scheduler().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_only_edit_keeps_reminder() {
        let service = service();
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();
        let before = service.scheduler().pending(&task.id).unwrap();

        service
            .update(
                &task.id,
                TaskEdit::fields(TaskPatch {
                    title: Some("Call dad".into()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        assert_eq!(service.scheduler().pending(&task.id), Some(before));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_and_missing_is_not_found() {
        let service = service();
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();

        service.delete(&task.id).await.unwrap();
        assert_eq!(service.scheduler().pending_count(), 0);

        assert!(matches!(service.delete(&task.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.toggle(&task.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.update(&task.id, TaskEdit::text("x tomorrow")).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interleaved_edits_leave_reminder_matching_last_write() {
        let store = Arc::new(GatedStore::default());
        let service = Arc::new(service_on(store.clone()));
        let task = service
            .create(NewTask {
                title: "Quarterly report".into(),
                due_instant: Some(t0() + chrono::Duration::hours(8)),
                ..Default::default()
            })
            .await
            .unwrap();

        store.hold_next_update.store(true, Ordering::SeqCst);
        let slow = tokio::spawn({
            let service = service.clone();
            let id = task.id.clone();
            async move { service.update(&id, due_edit(t0() + chrono::Duration::hours(10))).await }
        });
        store.applied.notified().await;

        let fast = tokio::spawn({
            let service = service.clone();
            let id = task.id.clone();
            async move { service.update(&id, due_edit(t0() + chrono::Duration::hours(5))).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.release.notify_one();

        slow.await.unwrap().unwrap();
        fast.await.unwrap().unwrap();

        let stored = service.get(&task.id).await.unwrap();
        let pending = service.scheduler().pending(&task.id).unwrap();
        assert_eq!(stored.due_instant, Some(t0() + chrono::Duration::hours(5)));
        assert_eq!(pending.fire_at, t0() + chrono::Duration::hours(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_during_edit_leaves_no_reminder() {
        let store = Arc::new(GatedStore::default());
        let service = Arc::new(service_on(store.clone()));
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();

        store.hold_next_update.store(true, Ordering::SeqCst);
        let edit = tokio::spawn({
            let service = service.clone();
            let id = task.id.clone();
            async move { service.update(&id, due_edit(t0() + chrono::Duration::hours(6))).await }
        });
        store.applied.notified().await;

        let delete = tokio::spawn({
            let service = service.clone();
            let id = task.id.clone();
            async move { service.delete(&id).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.release.notify_one();

        edit.await.unwrap().unwrap();
        delete.await.unwrap().unwrap();

        assert!(matches!(service.get(&task.id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(service.scheduler().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setting_same_due_keeps_reminder() {
        let service = service();
        let task = service.create_from_text("Call mom in 2 hours", None).await.unwrap();
        let before = service.scheduler().pending(&task.id).unwrap();

        service
            .update(&task.id, due_edit(task.due_instant.unwrap()))
            .await
            .unwrap();

        assert_eq!(service.scheduler().pending(&task.id), Some(before));
    }
}
