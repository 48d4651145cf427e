use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::directory::{DirectoryService, DirectoryStatus};
use crate::model::Plate;
use crate::observability::{SYNC_ATTEMPTS_TOTAL, SYNC_DROPPED_TOTAL};

/// Work for the directory that the ledger does not wait on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIntent {
    RegisterVehicle { plate: Plate },
}

/// Sending half of the sync queue. Owned by the ledger; never blocks.
#[derive(Debug, Clone)]
pub struct SyncOutbox {
    tx: mpsc::Sender<SyncIntent>,
}

impl SyncOutbox {
    pub fn channel(capacity: usize) -> (SyncOutbox, mpsc::Receiver<SyncIntent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (SyncOutbox { tx }, rx)
    }

    /// Queue an intent. A full or closed queue drops it.
    pub fn enqueue(&self, intent: SyncIntent) {
        match self.tx.try_send(intent) {
            Ok(()) => {}
            Err(TrySendError::Full(intent)) => {
                warn!("sync queue full, dropping {intent:?}");
                metrics::counter!(SYNC_DROPPED_TOTAL, "reason" => "full").increment(1);
            }
            Err(TrySendError::Closed(intent)) => {
                debug!("sync loop gone, dropping {intent:?}");
                metrics::counter!(SYNC_DROPPED_TOTAL, "reason" => "closed").increment(1);
            }
        }
    }
}

/// Background task that drains the sync queue against the directory.
/// 1. Block until the first intent arrives.
/// 2. Drain everything immediately available.
/// 3. Attempt each intent once, only while the directory is reachable.
///
/// Returns once every `SyncOutbox` has been dropped and the queue is empty.
pub async fn run_sync_loop(
    mut rx: mpsc::Receiver<SyncIntent>,
    directory: Arc<dyn DirectoryService>,
    status: DirectoryStatus,
) {
    while let Some(intent) = rx.recv().await {
        let mut batch = vec![intent];
        while let Ok(intent) = rx.try_recv() {
            batch.push(intent);
        }
        for intent in batch {
            attempt(directory.as_ref(), &status, intent).await;
        }
    }
    debug!("sync loop stopped");
}

async fn attempt(directory: &dyn DirectoryService, status: &DirectoryStatus, intent: SyncIntent) {
    match intent {
        SyncIntent::RegisterVehicle { plate } => {
            if !status.is_reachable() {
                debug!("directory offline, not syncing {plate}");
                metrics::counter!(SYNC_ATTEMPTS_TOTAL, "outcome" => "skipped").increment(1);
                return;
            }
            match directory.register_vehicle(plate.as_str()).await {
                Ok(true) => {
                    info!("directory accepted {plate}");
                    metrics::counter!(SYNC_ATTEMPTS_TOTAL, "outcome" => "accepted").increment(1);
                }
                Ok(false) => {
                    warn!("directory rejected {plate}");
                    metrics::counter!(SYNC_ATTEMPTS_TOTAL, "outcome" => "rejected").increment(1);
                }
                Err(e) => {
                    warn!("directory sync of {plate} failed: {e}");
                    metrics::counter!(SYNC_ATTEMPTS_TOTAL, "outcome" => "failed").increment(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::directory::DirectoryError;

    #[derive(Default)]
    struct RecordingDirectory {
        accepted: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl DirectoryService for RecordingDirectory {
        async fn health(&self) -> bool {
            true
        }

        async fn list_vehicles(&self) -> Result<Vec<String>, DirectoryError> {
            Ok(vec![])
        }

        async fn register_vehicle(&self, plate: &str) -> Result<bool, DirectoryError> {
            if self.fail {
                return Err(DirectoryError::Transport("connection reset".into()));
            }
            self.accepted.lock().unwrap().push(plate.to_string());
            Ok(true)
        }
    }

    fn intent(raw: &str) -> SyncIntent {
        SyncIntent::RegisterVehicle {
            plate: Plate::normalize(raw).unwrap(),
        }
    }

    #[tokio::test]
    async fn drains_queue_while_reachable() {
        let directory = Arc::new(RecordingDirectory::default());
        let status = DirectoryStatus::new();
        status.set(true);

        let (outbox, rx) = SyncOutbox::channel(8);
        outbox.enqueue(intent("abc123"));
        outbox.enqueue(intent("xyz789"));
        drop(outbox);

        run_sync_loop(rx, directory.clone(), status).await;

        assert_eq!(*directory.accepted.lock().unwrap(), vec!["ABC123", "XYZ789"]);
    }

    #[tokio::test]
    async fn skips_while_offline() {
        let directory = Arc::new(RecordingDirectory::default());
        let status = DirectoryStatus::new();

        let (outbox, rx) = SyncOutbox::channel(8);
        outbox.enqueue(intent("abc123"));
        drop(outbox);

        run_sync_loop(rx, directory.clone(), status).await;

        assert!(directory.accepted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let directory = Arc::new(RecordingDirectory { fail: true, ..Default::default() });
        let status = DirectoryStatus::new();
        status.set(true);

        let (outbox, rx) = SyncOutbox::channel(8);
        outbox.enqueue(intent("abc123"));
        drop(outbox);

        // Completes without panicking or retrying.
        run_sync_loop(rx, directory.clone(), status).await;
        assert!(directory.accepted.lock().unwrap().is_empty());
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (outbox, mut rx) = SyncOutbox::channel(1);
        outbox.enqueue(intent("first"));
        outbox.enqueue(intent("second"));

        assert_eq!(rx.try_recv().unwrap(), intent("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_drops_without_panicking() {
        let (outbox, rx) = SyncOutbox::channel(4);
        drop(rx);
        outbox.enqueue(intent("orphan"));
    }
}
