//! Background write queue for fire-and-forget persistence.
//!
//! Callers hand a serialized entry to the queue and continue immediately.
//! One worker task applies jobs strictly in FIFO order. A barrier job lets a
//! reader wait until everything enqueued before it has hit the backend,
//! which is how a caller observes its own earlier writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use enscache_core::{EnsCacheResult, StorageError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::store::VersionedStore;

enum Job {
    Write { key: String, bytes: Vec<u8> },
    Barrier(oneshot::Sender<()>),
}

/// Handle onto the write worker. Clones feed the same worker; the worker
/// exits once every handle is dropped and the queue has drained.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Job>,
    failed_writes: Arc<AtomicU64>,
}

impl WriteQueue {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// # Errors
    /// Returns `StorageError::Backend` when called outside a runtime.
    pub fn spawn(store: VersionedStore) -> EnsCacheResult<Self> {
        let handle = Handle::try_current().map_err(|e| StorageError::Backend {
            reason: format!("write queue needs a tokio runtime: {}", e),
        })?;
        Ok(Self::spawn_on(&handle, store))
    }

    /// Spawn the worker on an explicit runtime handle.
    pub fn spawn_on(handle: &Handle, store: VersionedStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let failed_writes = Arc::new(AtomicU64::new(0));
        handle.spawn(run_worker(store, rx, Arc::clone(&failed_writes)));
        Self { tx, failed_writes }
    }

    /// Queue an encoded entry for `key`. Returns once queued.
    pub fn enqueue(&self, key: String, bytes: Vec<u8>) -> EnsCacheResult<()> {
        self.tx
            .send(Job::Write { key, bytes })
            .map_err(|_| StorageError::QueueClosed)?;
        Ok(())
    }

    /// Wait until every job queued before this call has been applied.
    pub async fn flush(&self) -> EnsCacheResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Job::Barrier(done_tx))
            .map_err(|_| StorageError::QueueClosed)?;
        done_rx.await.map_err(|_| StorageError::QueueClosed)?;
        Ok(())
    }

    /// Number of queued writes the backend rejected.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }
}

async fn run_worker(
    store: VersionedStore,
    mut rx: mpsc::UnboundedReceiver<Job>,
    failed_writes: Arc<AtomicU64>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Write { key, bytes } => {
                if let Err(e) = store.save_encoded(&key, &bytes).await {
                    failed_writes.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %e, "Queued write failed");
                }
            }
            Job::Barrier(done) => {
                // Receiver may have given up waiting.
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Write queue drained, worker exiting");
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("failed_writes", &self.failed_writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{encode_entry, InMemoryBackend};

    #[tokio::test]
    async fn test_flush_applies_pending_writes_in_order() {
        let backend = InMemoryBackend::new();
        let store = VersionedStore::new(backend.clone());
        let queue = WriteQueue::spawn(store.clone()).unwrap();

        for i in 0..10u32 {
            let bytes = encode_entry("k", &i, "0.2.0").unwrap();
            queue.enqueue("k".to_string(), bytes).unwrap();
        }
        queue.flush().await.unwrap();

        let value: u32 = store.get("k", 0, "0.2.0").await;
        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_failed_writes_are_counted() {
        let backend = InMemoryBackend::new();
        backend.set_fail_writes(true);
        let queue = WriteQueue::spawn(VersionedStore::new(backend)).unwrap();

        let bytes = encode_entry("k", &1u8, "0.2.0").unwrap();
        queue.enqueue("k".to_string(), bytes).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(queue.failed_writes(), 1);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let result = WriteQueue::spawn(VersionedStore::new(InMemoryBackend::new()));
        assert!(result.is_err());
    }
}
