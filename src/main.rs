use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use parkledger::config::{LedgerConfig, ServiceConfig};
use parkledger::directory::{DirectoryService, DirectoryStatus, HttpDirectory, OfflineDirectory};
use parkledger::ledger::{Ledger, seed};
use parkledger::outbox::{self, SyncOutbox};
use parkledger::poller;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let service = ServiceConfig::from_env();
    let config = LedgerConfig::from_env();
    parkledger::observability::init(service.metrics_port)?;

    let directory: Arc<dyn DirectoryService> = match &service.directory_url {
        Some(url) => Arc::new(HttpDirectory::new(url, service.directory_timeout)?),
        None => Arc::new(OfflineDirectory),
    };
    let status = DirectoryStatus::new();

    info!("parkledger starting");
    info!("  capacity: {}", config.capacity);
    info!("  hourly rate: {}{}", config.currency_prefix, config.hourly_rate);
    info!("  directory: {}", service.directory_url.as_deref().unwrap_or("offline"));
    info!("  metrics: {}", service.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Demo host: nothing here registers vehicles, so the outbox only carries
    // traffic when the ledger is driven by an embedding caller.
    let (sync_outbox, sync_rx) = SyncOutbox::channel(service.sync_queue_capacity);
    let mut ledger = Ledger::new(config).with_outbox(sync_outbox);
    let source = seed::load_initial_data(&mut ledger, directory.as_ref(), &status).await;
    info!("seeded from {source:?}");

    let sync_task = tokio::spawn(outbox::run_sync_loop(sync_rx, directory.clone(), status.clone()));
    let cancel = CancellationToken::new();
    let poller_task = tokio::spawn(poller::run_health_poller(
        directory.clone(),
        status.clone(),
        service.health_interval,
        cancel.clone(),
    ));

    // Graceful shutdown on SIGTERM/ctrl-c
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut refresh = tokio::time::interval(service.health_interval);
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                let stats = ledger.snapshot_statistics();
                let reachability = if status.is_reachable() { "online" } else { "offline" };
                info!(
                    occupied = stats.occupied,
                    free = stats.free,
                    vehicles = stats.vehicles,
                    revenue = %ledger.format_amount(stats.revenue),
                    directory = reachability,
                    "ledger snapshot"
                );
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    cancel.cancel();
    // Dropping the ledger drops the last outbox sender, letting the sync loop drain and exit.
    drop(ledger);
    if tokio::time::timeout(Duration::from_secs(5), sync_task).await.is_err() {
        tracing::warn!("sync queue drain timed out");
    }
    poller_task.await.ok();

    info!("parkledger stopped");
    Ok(())
}
