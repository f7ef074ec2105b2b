use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::task::Task;

/// Error type for reading and writing the task document.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Represents a filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Represents a failure to encode the task collection.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persists the whole task collection as a single JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current collection.
    ///
    /// Never fails: a missing file is initialized to an empty array, and a file that cannot be
    /// read or does not hold an array of tasks is treated as an empty collection.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Vec<Task> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => parse_tasks(&contents).unwrap_or_else(|err| {
                tracing::error!("Failed to parse task file, treating it as empty: {}", err);
                Vec::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("Task file does not exist yet, initializing it");
                if let Err(err) = self.save(&[]).await {
                    tracing::error!("Failed to initialize task file: {}", err);
                }
                Vec::new()
            }
            Err(err) => {
                tracing::error!("Failed to read task file, treating it as empty: {}", err);
                Vec::new()
            }
        }
    }

    /// Replaces the file contents with a snapshot of `tasks`.
    ///
    /// The snapshot is written next to the target and renamed over it, so readers only ever see
    /// a complete document.
    #[tracing::instrument(skip(self, tasks), fields(path = %self.path.display(), count = tasks.len()))]
    pub async fn save(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(tasks)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json).await?;
        if let Err(err) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Parses the document as an array, keeping every element that reads as a task.
///
/// Missing optional fields take their defaults. Elements without a usable `id` or `title` are
/// skipped so the rest of the collection survives.
fn parse_tasks(contents: &str) -> Result<Vec<Task>, serde_json::Error> {
    if contents.is_empty() {
        return Ok(Vec::new());
    }
    let elements: Vec<serde_json::Value> = serde_json::from_str(contents)?;
    let tasks = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value(element) {
            Ok(task) => Some(task),
            Err(err) => {
                tracing::warn!("Skipping unreadable task at index {}: {}", index, err);
                None
            }
        })
        .collect();
    Ok(tasks)
}
