use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::directory::{DirectoryService, DirectoryStatus};

/// Background task that periodically probes the directory.
/// Writes only the reachability flag; the ledger itself is never touched.
pub async fn run_health_poller(
    directory: Arc<dyn DirectoryService>,
    status: DirectoryStatus,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => {
                tracing::debug!("health poller stopped");
                return;
            }
        }
        let reachable = directory.health().await;
        let previous = status.set(reachable);
        if previous != reachable {
            info!("directory {}", if reachable { "reachable" } else { "unreachable" });
        }
    }
}
