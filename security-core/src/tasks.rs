use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::hub::SecurityHub;

/// Shutdown handle for the background tasks: send `true` to stop them.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Periodic retention sweep. Holds the audit log's write access only for the
/// filter-and-truncate step inside `run_retention_sweep`, and stops promptly
/// when the shutdown channel fires.
pub fn spawn_retention_sweeper(
    hub: Arc<SecurityHub>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = hub.run_retention_sweep();
                }
                _ = shutdown.changed() => {
                    debug!("retention_sweeper_stopped");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use common_crypto::KeyRing;

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let hub = Arc::new(SecurityHub::new(
            SecurityConfig::default(),
            KeyRing::generate(),
        ));
        let (tx, rx) = shutdown_channel();
        let handle = spawn_retention_sweeper(hub, Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).expect("signal shutdown");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop promptly")
            .expect("sweeper task should not panic");
    }
}
