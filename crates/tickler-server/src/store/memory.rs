//! In-memory task store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tickler_core::{Task, TaskId, TaskPatch};

use super::{sorted, StoreError, TaskStore, TaskUpdate};

/// Volatile task store backed by a map. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Returns true if the store holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(sorted(self.tasks.read().await.values().cloned().collect()))
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn create(&self, task: Task) -> Result<Task, StoreError> {
        self.tasks.write().await.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<TaskUpdate, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let timing_changed = task.apply(patch);
        Ok(TaskUpdate {
            task: task.clone(),
            timing_changed,
        })
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.tasks
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud() {
        let store = InMemoryTaskStore::new();
        let task = store.create(Task::new("buy milk", None)).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&task.id).await.unwrap().unwrap().title, "buy milk");

        let updated = store.update(&task.id, TaskPatch::completed(true)).await.unwrap();
        assert!(updated.task.completed);
        assert!(updated.timing_changed);

        let unchanged = store.update(&task.id, TaskPatch::completed(true)).await.unwrap();
        assert!(!unchanged.timing_changed);

        store.delete(&task.id).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let store = InMemoryTaskStore::new();
        let id = TaskId::new("nope");

        assert!(store.get(&id).await.unwrap().is_none());
        assert!(matches!(
            store.update(&id, TaskPatch::completed(true)).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound(_))));
    }
}
