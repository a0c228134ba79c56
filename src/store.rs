//! Task state store
//!
//! Single source of truth for tasks and their per-link statuses. One
//! reader/writer lock guards the whole map; durability is a full JSON
//! snapshot overwritten on every save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;

/// Outcome of one link probe.
///
/// `Processing` is the only valid initial value; it is replaced at most
/// once by one of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Available,
    Unavailable,
    Processing,
    Error,
}

impl LinkStatus {
    /// Status string used by the HTTP API and reports.
    pub fn display_label(&self) -> &'static str {
        match self {
            LinkStatus::Available => "available",
            LinkStatus::Unavailable => "not available",
            LinkStatus::Processing => "processing",
            LinkStatus::Error => "error",
        }
    }
}

/// One batch of links submitted for checking.
///
/// The link set is fixed at creation; only status values mutate. Keys are
/// the link strings exactly as submitted, not normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub links: HashMap<String, LinkStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Errors from snapshot persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse snapshot {path}: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },
}

/// On-disk snapshot layout: the full task map plus the id counter.
#[derive(Deserialize)]
struct Snapshot {
    tasks: HashMap<u64, Task>,
    next_id: u64,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    tasks: &'a HashMap<u64, Task>,
    next_id: u64,
}

struct StoreInner {
    tasks: HashMap<u64, Task>,
    next_id: u64,
}

/// Concurrent task store, cheaply cloneable across handlers and probes.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<RwLock<StoreInner>>,
    state_file: PathBuf,
    snapshot_notify: Arc<Notify>,
}

impl TaskStore {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                tasks: HashMap::new(),
                next_id: 1,
            })),
            state_file: state_file.into(),
            snapshot_notify: Arc::new(Notify::new()),
        }
    }

    /// Create a task with every link set to `Processing`.
    ///
    /// Allocates the next id under the write lock, so ids are unique and
    /// strictly increasing even under concurrent creation. A snapshot is
    /// requested fire-and-forget; its failure never reaches the caller.
    pub async fn create_task(&self, links: &[String]) -> Task {
        let mut inner = self.inner.write().await;

        let now = Utc::now();
        let task = Task {
            id: inner.next_id,
            links: links
                .iter()
                .map(|link| (link.clone(), LinkStatus::Processing))
                .collect(),
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(task.id, task.clone());
        inner.next_id += 1;
        drop(inner);

        tracing::info!("Created task #{} with {} links", task.id, links.len());

        // Wake the snapshot writer; requests coalesce while a save runs.
        self.snapshot_notify.notify_one();

        task
    }

    /// Overwrite one link's status and refresh `updated_at`.
    ///
    /// Unknown task ids and unknown link keys are silent no-ops: an update
    /// racing stale data must not crash or grow the map.
    pub async fn update_link_status(&self, task_id: u64, link: &str, status: LinkStatus) {
        let mut inner = self.inner.write().await;

        if let Some(task) = inner.tasks.get_mut(&task_id) {
            if let Some(entry) = task.links.get_mut(link) {
                *entry = status;
                task.updated_at = Utc::now();
                tracing::debug!(
                    "Updated task #{}, link {} -> {}",
                    task_id,
                    link,
                    status.display_label()
                );
            }
        }
    }

    /// Owned copy of one task, or `None` if the id is unknown.
    pub async fn get_task(&self, task_id: u64) -> Option<Task> {
        let inner = self.inner.read().await;
        inner.tasks.get(&task_id).cloned()
    }

    /// Batch lookup for report rendering; missing ids are skipped.
    pub async fn get_tasks_for_report(&self, task_ids: &[u64]) -> Vec<Task> {
        let inner = self.inner.read().await;
        let tasks: Vec<Task> = task_ids
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect();
        tracing::info!(
            "Report requested for {:?}, found {} tasks",
            task_ids,
            tasks.len()
        );
        tasks
    }

    /// Serialize the entire store to the snapshot file, overwriting any
    /// previous snapshot. The write lock is held across the file write so
    /// every snapshot is internally consistent.
    pub async fn save_state(&self) -> Result<(), StoreError> {
        let inner = self.inner.write().await;

        let data = serde_json::to_vec_pretty(&SnapshotRef {
            tasks: &inner.tasks,
            next_id: inner.next_id,
        })?;
        tokio::fs::write(&self.state_file, data).await?;

        tracing::info!("State saved, {} tasks", inner.tasks.len());
        Ok(())
    }

    /// Load the snapshot file into the store.
    ///
    /// A missing file is a normal first run and leaves the store empty. A
    /// present-but-unparseable file is an error and leaves the store
    /// untouched. Links still `Processing` in the snapshot belong to probes
    /// lost to a crash and are reconciled to `Error`.
    pub async fn restore_state(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let data = match tokio::fs::read(&self.state_file).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No snapshot at {}, starting with an empty store",
                    self.state_file.display()
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot =
            serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
                path: self.state_file.display().to_string(),
                source,
            })?;
        inner.tasks = snapshot.tasks;
        inner.next_id = snapshot.next_id;

        let mut reconciled = 0;
        for task in inner.tasks.values_mut() {
            let mut touched = false;
            for status in task.links.values_mut() {
                if *status == LinkStatus::Processing {
                    *status = LinkStatus::Error;
                    touched = true;
                    reconciled += 1;
                }
            }
            if touched {
                task.updated_at = Utc::now();
            }
        }
        if reconciled > 0 {
            tracing::warn!("Reconciled {} interrupted links to error", reconciled);
        }

        tracing::info!("State restored, {} tasks", inner.tasks.len());
        Ok(())
    }

    /// Spawn the background snapshot writer.
    ///
    /// Consumes coalesced save requests from `create_task` so creation never
    /// spawns one save attempt per call. Failures are logged and the loop
    /// keeps running.
    pub fn spawn_snapshot_writer(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                store.snapshot_notify.notified().await;
                if let Err(e) = store.save_state().await {
                    tracing::error!("Background snapshot failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn links(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn task_ids_are_unique_and_increasing() {
        let store = TaskStore::new("unused.json");
        let a = store.create_task(&links(&["a.com"])).await;
        let b = store.create_task(&links(&["b.com"])).await;
        let c = store.create_task(&links(&["c.com"])).await;
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn concurrent_creation_never_collides() {
        let store = TaskStore::new("unused.json");
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_task(&links(&["example.com"])).await.id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn new_task_starts_all_processing() {
        let store = TaskStore::new("unused.json");
        let task = store.create_task(&links(&["a.com", "b.com"])).await;
        assert_eq!(task.links.len(), 2);
        assert!(task
            .links
            .values()
            .all(|s| *s == LinkStatus::Processing));
    }

    #[tokio::test]
    async fn update_overwrites_status_and_touches_timestamp() {
        let store = TaskStore::new("unused.json");
        let task = store.create_task(&links(&["a.com"])).await;

        store
            .update_link_status(task.id, "a.com", LinkStatus::Available)
            .await;

        let updated = store.get_task(task.id).await.unwrap();
        assert_eq!(updated.links["a.com"], LinkStatus::Available);
        assert!(updated.updated_at >= task.updated_at);
    }

    #[tokio::test]
    async fn update_on_unknown_task_or_link_is_a_noop() {
        let store = TaskStore::new("unused.json");
        let task = store.create_task(&links(&["a.com"])).await;

        store
            .update_link_status(999, "a.com", LinkStatus::Available)
            .await;
        store
            .update_link_status(task.id, "missing.com", LinkStatus::Available)
            .await;

        let after = store.get_task(task.id).await.unwrap();
        assert_eq!(after.links.len(), 1);
        assert_eq!(after.links["a.com"], LinkStatus::Processing);
        assert!(store.get_task(999).await.is_none());
    }

    #[tokio::test]
    async fn get_task_on_unknown_id_returns_none() {
        let store = TaskStore::new("unused.json");
        assert!(store.get_task(42).await.is_none());
    }

    #[tokio::test]
    async fn report_lookup_skips_missing_ids() {
        let store = TaskStore::new("unused.json");
        let task = store.create_task(&links(&["a.com"])).await;

        let found = store.get_tasks_for_report(&[task.id, 999]).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, task.id);
    }

    #[tokio::test]
    async fn save_restore_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = TaskStore::new(&path);
        let task = store.create_task(&links(&["a.com", "b.com"])).await;
        store
            .update_link_status(task.id, "a.com", LinkStatus::Available)
            .await;
        store
            .update_link_status(task.id, "b.com", LinkStatus::Unavailable)
            .await;
        store.save_state().await.unwrap();

        let fresh = TaskStore::new(&path);
        fresh.restore_state().await.unwrap();

        let restored = fresh.get_task(task.id).await.unwrap();
        assert_eq!(restored.links["a.com"], LinkStatus::Available);
        assert_eq!(restored.links["b.com"], LinkStatus::Unavailable);

        // id counter survives too
        let next = fresh.create_task(&links(&["c.com"])).await;
        assert_eq!(next.id, task.id + 1);
    }

    #[tokio::test]
    async fn restore_missing_file_leaves_store_empty() {
        let dir = tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("nope.json"));
        store.restore_state().await.unwrap();
        assert!(store.get_task(1).await.is_none());
    }

    #[tokio::test]
    async fn restore_corrupt_file_errors_without_partial_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = TaskStore::new(&path);
        let err = store.restore_state().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(store.get_task(1).await.is_none());

        // the store is still usable after a failed restore
        let task = store.create_task(&links(&["a.com"])).await;
        assert_eq!(task.id, 1);
    }

    #[tokio::test]
    async fn snapshot_writer_persists_created_tasks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = TaskStore::new(&path);
        store.spawn_snapshot_writer();
        let task = store.create_task(&links(&["a.com"])).await;

        // creation only requests the save; wait for the writer to land it
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(path.exists());

        let fresh = TaskStore::new(&path);
        fresh.restore_state().await.unwrap();
        assert!(fresh.get_task(task.id).await.is_some());
    }

    #[tokio::test]
    async fn restore_reconciles_interrupted_links_to_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = TaskStore::new(&path);
        let task = store.create_task(&links(&["a.com", "b.com"])).await;
        store
            .update_link_status(task.id, "a.com", LinkStatus::Available)
            .await;
        // b.com is still Processing when the snapshot lands
        store.save_state().await.unwrap();

        let fresh = TaskStore::new(&path);
        fresh.restore_state().await.unwrap();

        let restored = fresh.get_task(task.id).await.unwrap();
        assert_eq!(restored.links["a.com"], LinkStatus::Available);
        assert_eq!(restored.links["b.com"], LinkStatus::Error);
    }
}
