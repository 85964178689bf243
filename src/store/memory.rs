// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info};

use crate::error::{MapLoadError, RemoteWriteError, WriteOp};
use crate::registry::models::{MarkerId, QuestRecord};
use crate::store::snapshot::Snapshot;
use crate::store::traits::{RemoteStore, Subscription};

type Collection = BTreeMap<String, QuestRecord>;

/// In-process store with the same contract as the remote one. Every write
/// bumps a version that wakes all subscribers.
#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    version: Arc<watch::Sender<u64>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(version),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every following write fail with `RemoteWriteError::Rejected`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Receiver that changes after each successful write
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Live subscriptions plus outstanding `changes()` receivers
    pub fn subscriber_count(&self) -> usize {
        self.version.receiver_count()
    }

    pub async fn record(&self, path: &str, id: MarkerId) -> Option<QuestRecord> {
        let collections = self.collections.read().await;
        collections
            .get(normalize(path))
            .and_then(|collection| collection.get(&id.to_string()))
            .cloned()
    }

    pub async fn snapshot(&self, path: &str) -> Snapshot {
        let collections = self.collections.read().await;
        let entries = collections
            .get(normalize(path))
            .map(|collection| {
                collection
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Snapshot::from_entries(entries)
    }

    /// Write under an arbitrary key, as another client would
    pub async fn insert_raw(&self, path: &str, key: &str, record: QuestRecord) {
        self.collections
            .write()
            .await
            .entry(normalize(path).to_string())
            .or_default()
            .insert(key.to_string(), record);
        self.bump();
    }

    fn check_writable(&self, op: WriteOp, target: &str) -> Result<(), RemoteWriteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteWriteError::Rejected {
                op,
                target: target.to_string(),
                reason: "writes disabled".to_string(),
            });
        }
        Ok(())
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version += 1);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription, MapLoadError> {
        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let path = normalize(path).to_string();
        info!(path = %path, "Memory subscription established");
        let mut changes = self.version.subscribe();

        let task = tokio::spawn(async move {
            loop {
                changes.borrow_and_update();
                if tx.send(store.snapshot(&path).await).await.is_err() {
                    return;
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }

    async fn upsert(&self, path: &str, id: MarkerId, record: QuestRecord) -> Result<(), RemoteWriteError> {
        let target = format!("{}/{}", normalize(path), id);
        self.check_writable(WriteOp::Upsert, &target)?;

        self.collections
            .write()
            .await
            .entry(normalize(path).to_string())
            .or_default()
            .insert(id.to_string(), record);
        self.bump();

        debug!(target = %target, "Memory upsert");
        Ok(())
    }

    async fn delete(&self, path: &str, id: MarkerId) -> Result<(), RemoteWriteError> {
        let target = format!("{}/{}", normalize(path), id);
        self.check_writable(WriteOp::Delete, &target)?;

        let removed = self
            .collections
            .write()
            .await
            .get_mut(normalize(path))
            .and_then(|collection| collection.remove(&id.to_string()));
        if removed.is_some() {
            self.bump();
        }

        debug!(target = %target, "Memory delete");
        Ok(())
    }

    async fn delete_all(&self, path: &str) -> Result<(), RemoteWriteError> {
        let target = normalize(path).to_string();
        self.check_writable(WriteOp::DeleteAll, &target)?;

        self.collections.write().await.remove(&target);
        self.bump();

        debug!(target = %target, "Memory delete_all");
        Ok(())
    }
}
