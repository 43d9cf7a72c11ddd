//! C5 Health & Backup Loops: per-service `tokio::time::interval` +
//! `tokio::select!` tasks with a per-service cancellation channel.
//!
//! Each pair runs a `tokio::select! { tick, shutdown }` loop over its own
//! cancellation channel, generalized from a single process-wide loop to
//! one health loop and one backup loop per active service.

mod backup;
mod health;

use std::sync::Arc;
use std::time::Duration;

use statefuld_agent_client::AgentClient;
use statefuld_cluster::ClusterCoordinator;
use statefuld_types::Service;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Operationally-tunable floors under which the loops refuse to run too
/// tightly, regardless of how aggressive a declared spec interval is.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub min_health_interval: Duration,
    pub min_backup_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            min_health_interval: Duration::from_secs(1),
            min_backup_interval: Duration::from_secs(5),
        }
    }
}

/// Owns the running health and backup tasks for one service. Dropping
/// this without calling [`ServiceLoops::shutdown`] leaves the tasks
/// running in the background; the facade is expected to call
/// `shutdown` on `Terminate`.
pub struct ServiceLoops {
    shutdown_tx: watch::Sender<()>,
    health: JoinHandle<()>,
    backup: JoinHandle<()>,
}

impl ServiceLoops {
    /// Spawns the health and backup loops for `service`. The backup
    /// loop task exits immediately if no volume has backups enabled.
    pub fn spawn(
        service: Arc<Mutex<Service>>,
        agent: Arc<dyn AgentClient>,
        cluster: Arc<ClusterCoordinator>,
        settings: LoopSettings,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let health = tokio::spawn(health::run(
            service.clone(),
            agent.clone(),
            cluster,
            settings.min_health_interval,
            shutdown_rx.clone(),
        ));
        let backup = tokio::spawn(backup::run(service, agent, settings.min_backup_interval, shutdown_rx));

        Self { shutdown_tx, health, backup }
    }

    /// Signals both loops to stop and waits for them to exit cleanly.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.health.await;
        let _ = self.backup.await;
    }
}
