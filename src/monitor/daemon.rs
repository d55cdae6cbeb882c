// Monitoring Daemon - Periodic driver for reconciliation cycles

use crate::Result;
use crate::cluster::{ConfigMap, InMemoryCluster};
use crate::monitor::config::Settings;
use crate::monitor::reconciler::{CycleResult, Reconciler};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, interval};

/// Delay before retrying a monitor whose last cycle failed
const FAILURE_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Main monitoring daemon
pub struct MonitorDaemon {
    reconciler: Arc<Reconciler>,
    monitors: Vec<String>,
    /// `None` once a monitor is gone
    next_due: Mutex<HashMap<String, Option<Instant>>>,
    stats: Mutex<DaemonStats>,
    running: Arc<AtomicBool>,
    tick: Duration,
}

impl MonitorDaemon {
    /// Create new monitoring daemon driving the given monitors
    pub fn new(reconciler: Arc<Reconciler>, monitors: Vec<String>) -> Self {
        let stats = DaemonStats {
            monitors: monitors.len(),
            ..DaemonStats::default()
        };

        Self {
            reconciler,
            monitors,
            next_due: Mutex::new(HashMap::new()),
            stats: Mutex::new(stats),
            running: Arc::new(AtomicBool::new(false)),
            tick: Duration::from_secs(10),
        }
    }

    /// How often the loop checks for due monitors
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Start the monitoring daemon
    pub async fn start(&self) -> Result<()> {
        tracing::info!("Starting certmon daemon");

        self.running.store(true, Ordering::SeqCst);
        self.setup_signal_handlers();

        tracing::info!("Monitoring {} resource(s)", self.monitors.len());

        let mut tick_interval = interval(self.tick);

        while self.running.load(Ordering::SeqCst) {
            tick_interval.tick().await;
            self.run_due_cycles().await;
        }

        tracing::info!("Monitoring daemon stopped");
        Ok(())
    }

    /// Stop the daemon
    pub fn stop(&self) {
        tracing::info!("Stopping monitoring daemon...");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run one cycle for every monitor, regardless of schedule
    pub async fn run_once(&self) -> Vec<(String, CycleResult)> {
        let cycles = self.monitors.iter().map(|name| async move {
            let result = self.reconciler.reconcile(name).await;
            self.record(name, &result).await;
            (name.clone(), result)
        });

        futures::future::join_all(cycles).await
    }

    /// Run cycles for monitors whose requeue delay has elapsed
    async fn run_due_cycles(&self) {
        let now = Instant::now();
        let due: Vec<&String> = {
            let next_due = self.next_due.lock().await;
            self.monitors
                .iter()
                .filter(|name| match next_due.get(*name) {
                    None => true,
                    Some(Some(at)) => *at <= now,
                    Some(None) => false,
                })
                .collect()
        };

        if due.is_empty() {
            return;
        }

        tracing::debug!("{} monitor(s) due", due.len());

        let cycles = due.into_iter().map(|name| async move {
            let result = self.reconciler.reconcile(name).await;
            self.record(name, &result).await;
        });

        futures::future::join_all(cycles).await;
    }

    /// Update stats and schedule the next cycle for `name`
    async fn record(&self, name: &str, result: &CycleResult) {
        let delay = {
            let mut stats = self.stats.lock().await;
            match result {
                Ok(Some(report)) => {
                    stats.cycles_completed += 1;
                    stats.notifications_sent += report.notified.len();
                    stats.last_skipped = report.skipped;
                    Some(report.requeue_after)
                }
                Ok(None) => {
                    tracing::info!("Monitor {} is gone, no longer scheduling it", name);
                    stats.cycles_completed += 1;
                    None
                }
                Err(e) => {
                    tracing::error!("Cycle for {} failed: {}", name, e);
                    stats.cycles_failed += 1;
                    Some(FAILURE_RETRY_DELAY)
                }
            }
        };

        self.next_due
            .lock()
            .await
            .insert(name.to_string(), delay.map(|d| Instant::now() + d));
    }

    /// Setup signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let (mut sigterm, mut sigint) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::error!("Failed to setup signal handlers: {}", e);
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT");
                    }
                }

                running.store(false, Ordering::SeqCst);
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to setup Ctrl+C handler: {}", e);
                    return;
                }

                tracing::info!("Received Ctrl+C");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    /// Get daemon statistics
    pub async fn stats(&self) -> DaemonStats {
        let mut stats = self.stats.lock().await.clone();
        stats.running = self.running.load(Ordering::SeqCst);
        stats
    }
}

/// Daemon statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonStats {
    pub monitors: usize,
    pub cycles_completed: usize,
    pub cycles_failed: usize,
    pub notifications_sent: usize,
    pub last_skipped: usize,
    pub running: bool,
}

/// Load the monitors and recipients from `settings` into an in-memory cluster
pub async fn seed_cluster(cluster: &InMemoryCluster, settings: &Settings) -> Result<Vec<String>> {
    let mut recipients: Vec<String> = Vec::new();
    let mut names = Vec::new();

    for monitor in &settings.monitors {
        cluster.apply_monitor(&monitor.name, monitor.spec.clone()).await;
        names.push(monitor.name.clone());

        for recipient in &monitor.recipients {
            if !recipients.contains(recipient) {
                recipients.push(recipient.clone());
            }
        }
    }

    let emails = serde_json::to_string(&recipients)
        .map_err(|e| anyhow::anyhow!("Failed to encode recipients: {}", e))?;

    let mut data = BTreeMap::new();
    data.insert(settings.recipients.key.clone(), emails);
    cluster
        .put_config_map(ConfigMap {
            namespace: settings.recipients.config_map_namespace.clone(),
            name: settings.recipients.config_map_name.clone(),
            data,
        })
        .await;

    tracing::debug!(
        "Seeded {} monitor(s) and {} recipient(s)",
        names.len(),
        recipients.len()
    );

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterClient;
    use crate::monitor::alerts::LogNotifier;
    use crate::monitor::config::{MonitorDefinition, MonitorSpec};
    use crate::utils::clock::SystemClock;

    fn settings() -> Settings {
        Settings {
            monitors: vec![
                MonitorDefinition {
                    name: "a".to_string(),
                    recipients: vec!["ops@example.com".to_string()],
                    spec: MonitorSpec::default(),
                },
                MonitorDefinition {
                    name: "b".to_string(),
                    recipients: vec!["ops@example.com".to_string(), "sre@example.com".to_string()],
                    spec: MonitorSpec {
                        check_interval_seconds: 60,
                        ..MonitorSpec::default()
                    },
                },
            ],
            ..Settings::default()
        }
    }

    async fn daemon() -> (Arc<InMemoryCluster>, MonitorDaemon) {
        let cluster = Arc::new(InMemoryCluster::new());
        let names = seed_cluster(&cluster, &settings()).await.unwrap();
        let reconciler = Reconciler::new(cluster.clone(), Arc::new(LogNotifier), Arc::new(SystemClock));
        (cluster, MonitorDaemon::new(Arc::new(reconciler), names))
    }

    #[tokio::test]
    async fn test_seed_cluster() {
        let cluster = InMemoryCluster::new();
        let names = seed_cluster(&cluster, &settings()).await.unwrap();
        assert_eq!(names, vec!["a", "b"]);

        let config_map = cluster
            .get_config_map("default", "email-recipients-config")
            .await
            .unwrap();
        assert_eq!(
            config_map.data.get("emails").unwrap(),
            r#"["ops@example.com","sre@example.com"]"#
        );
    }

    #[tokio::test]
    async fn test_run_once_reconciles_every_monitor() {
        let (cluster, daemon) = daemon().await;

        let results = daemon.run_once().await;
        assert_eq!(results.len(), 2);
        for (_, result) in &results {
            let report = result.as_ref().unwrap().as_ref().unwrap();
            assert_eq!(report.totals.total, 0);
        }
        assert_eq!(results[1].1.as_ref().unwrap().as_ref().unwrap().requeue_after, Duration::from_secs(60));
        assert_eq!(cluster.status_writes().await, 2);

        let stats = daemon.stats().await;
        assert_eq!(stats.monitors, 2);
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.cycles_failed, 0);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn test_deleted_monitor_is_not_rescheduled() {
        let (cluster, daemon) = daemon().await;
        cluster.delete_monitor("a").await;

        daemon.run_due_cycles().await;
        assert_eq!(cluster.status_writes().await, 1);

        // Nothing is due right after a cycle
        daemon.run_due_cycles().await;
        assert_eq!(cluster.status_writes().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let (cluster, daemon) = daemon().await;
        let daemon = Arc::new(daemon.with_tick(Duration::from_secs(1)));

        let runner = Arc::clone(&daemon);
        let handle = tokio::spawn(async move { runner.start().await });

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(daemon.stats().await.running);
        daemon.stop();
        handle.await.unwrap().unwrap();

        // First tick runs both monitors, "b" runs again after its 60s interval
        assert_eq!(cluster.status_writes().await, 3);
        assert!(!daemon.stats().await.running);
    }
}
