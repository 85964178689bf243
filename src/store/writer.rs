// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::RemoteWriteError;
use crate::registry::models::{MarkerId, QuestRecord};
use crate::store::traits::RemoteStore;

/// Receives every failed remote write
pub type ErrorHook = Arc<dyn Fn(&RemoteWriteError) + Send + Sync>;

pub fn log_write_error(err: &RemoteWriteError) {
    error!(op = %err.op(), target = %err.target(), error = %err, "Remote write failed");
}

/// Fire-and-forget front for a `RemoteStore`.
///
/// Every call spawns the write and returns at once. Failures go to the error
/// hook; nothing is retried or rolled back.
#[derive(Clone)]
pub struct RemoteWriter {
    store: Arc<dyn RemoteStore>,
    collection: String,
    on_error: ErrorHook,
}

impl RemoteWriter {
    pub fn new(store: Arc<dyn RemoteStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            on_error: Arc::new(log_write_error),
        }
    }

    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    pub fn upsert(&self, id: MarkerId, record: QuestRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        self.spawn(async move { store.upsert(&collection, id, record).await })
    }

    pub fn delete(&self, id: MarkerId) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        self.spawn(async move { store.delete(&collection, id).await })
    }

    pub fn delete_all(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        self.spawn(async move {
            store.delete_all(&collection).await?;
            info!(collection = %collection, "Markers successfully removed from remote store");
            Ok(())
        })
    }

    fn spawn<F>(&self, write: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = Result<(), RemoteWriteError>> + Send + 'static,
    {
        let on_error = Arc::clone(&self.on_error);
        tokio::spawn(async move {
            if let Err(e) = write.await {
                on_error(&e);
            }
        })
    }
}

impl std::fmt::Debug for RemoteWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWriter")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteOp;
    use crate::registry::models::Coordinate;
    use crate::store::memory::MemoryStore;
    use std::sync::Mutex;

    fn collecting_hook() -> (ErrorHook, Arc<Mutex<Vec<(WriteOp, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: ErrorHook = Arc::new(move |err: &RemoteWriteError| {
            sink.lock().unwrap().push((err.op(), err.target().to_string()));
        });
        (hook, seen)
    }

    #[tokio::test]
    async fn test_writes_reach_store() {
        let store = MemoryStore::new();
        let writer = RemoteWriter::new(Arc::new(store.clone()), "quests");

        writer
            .upsert(3, QuestRecord::new(Coordinate::new(1.0, 2.0)))
            .await
            .unwrap();
        assert!(store.record("quests", 3).await.is_some());

        writer.delete(3).await.unwrap();
        assert!(store.record("quests", 3).await.is_none());
    }

    #[tokio::test]
    async fn test_failures_go_to_hook() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let (hook, seen) = collecting_hook();
        let writer = RemoteWriter::new(Arc::new(store), "quests").with_error_hook(hook);

        writer.upsert(1, QuestRecord::new(Coordinate::new(0.0, 0.0))).await.unwrap();
        writer.delete(2).await.unwrap();
        writer.delete_all().await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (WriteOp::Upsert, "quests/1".to_string()),
                (WriteOp::Delete, "quests/2".to_string()),
                (WriteOp::DeleteAll, "quests".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_successful_writes_do_not_call_hook() {
        let (hook, seen) = collecting_hook();
        let writer = RemoteWriter::new(Arc::new(MemoryStore::new()), "quests").with_error_hook(hook);

        writer.delete_all().await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }
}
