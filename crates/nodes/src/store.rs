//! Persistence for the two run artefacts: the history list and the output document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{append_history, HistoryStore, PipelineOutput, StoreError, HISTORY_CAPACITY};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// History kept as a pretty-printed JSON array of titles.
///
/// Appends from concurrent runs are serialized so no update is lost.
pub struct JsonFileHistoryStore {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, HISTORY_CAPACITY)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Vec<String> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(error) => {
                debug!(path = %self.path.display(), error = %error, "history not readable, starting empty");
                return Vec::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|error| {
            warn!(path = %self.path.display(), error = %error, "history is not a JSON list of titles, starting empty");
            Vec::new()
        })
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn load(&self) -> Vec<String> {
        self.read().await
    }

    async fn append(&self, titles: &[String]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read().await;
        let next = append_history(&current, titles, self.capacity);
        write_json(&self.path, &next).await?;
        debug!(path = %self.path.display(), added = titles.len(), total = next.len(), "history updated");
        Ok(())
    }
}

/// In-memory history, for tests and ephemeral servers.
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<String>>,
    capacity: usize,
}

impl MemoryHistoryStore {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: Mutex::new(entries),
            capacity: HISTORY_CAPACITY,
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> Vec<String> {
        self.entries.lock().await.clone()
    }

    async fn append(&self, titles: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        *entries = append_history(&entries, titles, self.capacity);
        Ok(())
    }
}

/// Writes the output document as pretty-printed JSON, creating parent directories.
pub async fn write_output(path: &Path, output: &PipelineOutput) -> Result<(), StoreError> {
    write_json(path, output).await
}

/// Serializes `value` to a sibling temp file, then renames it over `path`.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let display = path.display().to_string();
    let io_error = |source| StoreError::Io {
        path: display.clone(),
        source,
    };

    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
        path: display.clone(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, json).await.map_err(io_error)?;
    tokio::fs::rename(&temp, path).await.map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn missing_or_corrupt_history_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHistoryStore::new(dir.path().join("history.json"));
        assert!(store.load().await.is_empty());

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn append_writes_pretty_json_and_caps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("history.json");
        let store = JsonFileHistoryStore::with_capacity(&path, 3);

        store.append(&["a".into(), "b".into()]).await.unwrap();
        store.append(&["c".into(), "d".into()]).await.unwrap();

        assert_eq!(store.load().await, vec!["b", "c", "d"]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  \"b\""));
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileHistoryStore::new(dir.path().join("history.json")));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.append(&[format!("title {i}")]).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.load().await.len(), 8);
    }

    #[tokio::test]
    async fn memory_store_applies_the_same_cap() {
        let store = MemoryHistoryStore::new((0..99).map(|i| i.to_string()).collect());
        store.append(&["x".into(), "y".into()]).await.unwrap();
        let entries = store.load().await;
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries.first().map(String::as_str), Some("1"));
        assert_eq!(entries.last().map(String::as_str), Some("y"));
    }

    #[tokio::test]
    async fn output_document_is_written_with_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("output.json");
        let output = PipelineOutput::new(vec![], 6.5, Duration::from_millis(1_500), Utc::now());
        write_output(&path, &output).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["execution_time_seconds"], 1.5);
        assert_eq!(value["evaluation_score"], 6.5);
        assert!(value["articles"].as_array().unwrap().is_empty());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
