// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{MapLoadError, RemoteWriteError};
use crate::registry::models::{MarkerId, QuestRecord};
use crate::store::snapshot::Snapshot;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Start streaming full snapshots of `path`: one right away, then one per
    /// remote change, until the returned subscription is dropped
    async fn subscribe(&self, path: &str) -> Result<Subscription, MapLoadError>;

    /// Overwrite the whole record at `path/id`
    async fn upsert(&self, path: &str, id: MarkerId, record: QuestRecord) -> Result<(), RemoteWriteError>;

    /// Remove `path/id`; succeeds when nothing is there
    async fn delete(&self, path: &str, id: MarkerId) -> Result<(), RemoteWriteError>;

    /// Remove every record under `path`
    async fn delete_all(&self, path: &str) -> Result<(), RemoteWriteError>;
}

/// Live feed of snapshots. Dropping it stops the background reader.
pub struct Subscription {
    receiver: mpsc::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<Snapshot>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Next snapshot, or None once the feed is cancelled
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.receiver.close();
            debug!("Remote subscription cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
