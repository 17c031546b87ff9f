//! JSON-file task store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tickler_core::{Task, TaskId, TaskPatch};

use super::{sorted, StoreError, TaskStore, TaskUpdate};

/// Task store persisted as a single JSON array.
///
/// Every mutation rewrites the whole snapshot to a sibling temp file and
/// renames it over the original, so a crash never leaves a half-written file.
pub struct JsonFileTaskStore {
    path: PathBuf,
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl JsonFileTaskStore {
    /// Open the store at `path`, loading existing tasks if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tasks: Vec<Task> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), tasks = tasks.len(), "Opened task store");

        Ok(Self {
            path,
            tasks: RwLock::new(tasks.into_iter().map(|t| (t.id.clone(), t)).collect()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tasks: &HashMap<TaskId, Task>) -> Result<(), StoreError> {
        let snapshot = sorted(tasks.values().cloned().collect());
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), tasks = snapshot.len(), "Task store written");
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(sorted(self.tasks.read().await.values().cloned().collect()))
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn create(&self, task: Task) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), task.clone());
        self.persist(&tasks).await?;
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<TaskUpdate, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let timing_changed = task.apply(patch);
        let updated = TaskUpdate {
            task: task.clone(),
            timing_changed,
        };
        self.persist(&tasks).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(id).is_none() {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.persist(&tasks).await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let tasks = self.tasks.read().await;
        self.persist(&tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let due = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();

        let id = {
            let store = JsonFileTaskStore::open(&path).await.unwrap();
            let task = store
                .create(Task::new("Call mom", Some(due)).with_notify_target("me@example.com"))
                .await
                .unwrap();
            store.create(Task::new("other", None)).await.unwrap();
            task.id
        };

        let store = JsonFileTaskStore::open(&path).await.unwrap();
        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 2);

        let task = store.get(&id).await.unwrap().unwrap();
        assert_eq!(task.title, "Call mom");
        assert_eq!(task.due_instant, Some(due));
        assert_eq!(task.notify_target.as_deref(), Some("me@example.com"));
    }

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTaskStore::open(dir.path().join("nested/tasks.json"))
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());

        // First write creates the parent directory.
        store.create(Task::new("x", None)).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_delete_and_update_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");

        let store = JsonFileTaskStore::open(&path).await.unwrap();
        let a = store.create(Task::new("a", None)).await.unwrap();
        let b = store.create(Task::new("b", None)).await.unwrap();
        store.delete(&a.id).await.unwrap();
        store.update(&b.id, TaskPatch::completed(true)).await.unwrap();
        drop(store);

        let store = JsonFileTaskStore::open(&path).await.unwrap();
        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].completed);
        assert!(!dir.path().join("tasks.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            JsonFileTaskStore::open(&path).await,
            Err(StoreError::Json(_))
        ));
    }
}
