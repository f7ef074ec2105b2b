use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod api;
pub mod store;

use store::{JsonFileStore, StorageError};

/// A single to-do item.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: u64,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a pending task whose timestamps are both `now`.
    pub fn new(id: u64, title: String, description: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies `update` in place. Nothing is changed when the update is rejected.
    fn apply(&mut self, update: TaskUpdate, now: DateTime<Utc>) -> Result<(), TaskServiceError> {
        let title = match update.title {
            Some(title) => {
                let title = title.trim();
                if title.is_empty() {
                    return Err(TaskServiceError::Validation(
                        "Title cannot be empty.".to_string(),
                    ));
                }
                Some(title.to_string())
            }
            None => None,
        };

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Partial update of a task. Fields left as `None` keep their current value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Source of the timestamps written onto tasks.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// Represents caller input that violates a task constraint.
    #[error("{0}")]
    Validation(String),
    /// Represents a task id that is not in the collection.
    #[error("Task with ID {0} not found")]
    NotFound(u64),
    /// Represents a collection whose largest ID leaves no room for another task.
    #[error("Task ID space exhausted")]
    IdSpaceExhausted,
    /// Represents a failure to persist the collection.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Shared state for everything that touches the task collection.
///
/// The store sits behind an async mutex so each load, mutate and persist cycle runs alone.
#[derive(Clone, Debug)]
pub struct TaskState {
    pub store: Arc<Mutex<JsonFileStore>>,
    pub clock: Arc<dyn Clock>,
    pub max_body_bytes: usize,
}

impl TaskState {
    pub fn new(store: JsonFileStore, max_body_bytes: usize) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), max_body_bytes)
    }

    pub fn with_clock(store: JsonFileStore, clock: Arc<dyn Clock>, max_body_bytes: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            clock,
            max_body_bytes,
        }
    }

    pub fn service(&self) -> TaskService<'_> {
        TaskService::new(&self.store, self.clock.as_ref())
    }
}

pub struct TaskService<'a> {
    store: &'a Mutex<JsonFileStore>,
    clock: &'a dyn Clock,
}

impl<'a> TaskService<'a> {
    pub fn new(store: &'a Mutex<JsonFileStore>, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Makes sure the backing file exists, creating an empty collection if needed.
    ///
    /// # Returns
    ///
    /// The number of tasks currently stored.
    #[tracing::instrument(skip(self))]
    pub async fn init(&self) -> usize {
        let store = self.store.lock().await;
        store.load().await.len()
    }

    /// Retrieves every task in creation order.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self) -> Vec<Task> {
        let store = self.store.lock().await;
        store.load().await
    }

    /// Retrieves the task with the given ID.
    #[tracing::instrument(skip(self))]
    pub async fn find_task(&self, id: u64) -> Result<Task, TaskServiceError> {
        let store = self.store.lock().await;
        store
            .load()
            .await
            .into_iter()
            .find(|task| task.id == id)
            .ok_or(TaskServiceError::NotFound(id))
    }

    /// Creates a new task at the end of the collection.
    ///
    /// # Arguments
    ///
    /// * `title` - The task title. Surrounding whitespace is trimmed and the result must not be empty.
    /// * `description` - Free-form details, trimmed. May be empty.
    ///
    /// # Returns
    ///
    /// A `Result` containing the full updated collection if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Vec<Task>, TaskServiceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskServiceError::Validation(
                "Title is required.".to_string(),
            ));
        }

        let store = self.store.lock().await;
        let mut tasks = store.load().await;
        let id = next_id(&tasks).ok_or(TaskServiceError::IdSpaceExhausted)?;
        tasks.push(Task::new(
            id,
            title.to_string(),
            description.trim().to_string(),
            self.clock.now(),
        ));
        store.save(&tasks).await?;

        tracing::info!(task_id = id, "Created task");
        Ok(tasks)
    }

    /// Applies a partial update to the task with the given ID.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the task to update.
    /// * `update` - The fields to change.
    ///
    /// # Returns
    ///
    /// A `Result` containing the full updated collection if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        id: u64,
        update: TaskUpdate,
    ) -> Result<Vec<Task>, TaskServiceError> {
        let store = self.store.lock().await;
        let mut tasks = store.load().await;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(TaskServiceError::NotFound(id))?;
        task.apply(update, self.clock.now())?;
        store.save(&tasks).await?;

        tracing::info!(task_id = id, "Updated task");
        Ok(tasks)
    }

    /// Deletes the task with the given ID, keeping the others in their original order.
    ///
    /// # Returns
    ///
    /// A `Result` containing the full updated collection if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: u64) -> Result<Vec<Task>, TaskServiceError> {
        let store = self.store.lock().await;
        let mut tasks = store.load().await;
        let index = tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(TaskServiceError::NotFound(id))?;
        tasks.remove(index);
        store.save(&tasks).await?;

        tracing::info!(task_id = id, "Deleted task");
        Ok(tasks)
    }
}

/// The next ID is one past the largest ID currently stored, or `None` once that would overflow.
fn next_id(tasks: &[Task]) -> Option<u64> {
    tasks.iter().map(Task::id).max().unwrap_or(0).checked_add(1)
}
