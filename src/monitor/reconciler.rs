// Reconciliation - One monitoring cycle for one monitored resource
//
// read monitor -> discover -> parse -> classify -> cooldown -> notify ->
// merge -> conditional write (re-read and replay the merge on conflict)

use crate::certificates::parser;
use crate::cluster::{CertificateMonitor, ClusterClient};
use crate::error::{ClusterError, MonitorError};
use crate::monitor::alerts::{self, Notification, Notifier};
use crate::monitor::config::{CooldownPolicy, EngineSettings, RecipientSettings, Settings};
use crate::monitor::cooldown::should_notify;
use crate::monitor::merge::{CycleDelta, merge};
use crate::monitor::types::{
    CertificateObservation, MonitorSnapshot, MonitorStatus, SourceKind, StatusTotals,
};
use crate::sources::{CertificateSource, EndpointSource, FilesystemSource, SecretSource};
use crate::utils::clock::Clock;
use crate::utils::retry::{RetryError, retry_with_backoff};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of a completed cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub monitor: String,
    /// Status as written to the cluster
    pub status: MonitorStatus,
    /// Qualified names notified during this cycle
    pub notified: Vec<String>,
    pub totals: StatusTotals,
    /// Candidates that could not be fetched or parsed
    pub skipped: usize,
    pub requeue_after: Duration,
}

/// Result of one call to [`Reconciler::reconcile`]
pub type CycleResult = Result<Option<CycleReport>, MonitorError>;

/// Runs reconciliation cycles
pub struct Reconciler {
    cluster: Arc<dyn ClusterClient>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    sources: Vec<Arc<dyn CertificateSource>>,
    recipients: RecipientSettings,
    engine: EngineSettings,
}

impl Reconciler {
    /// Create a reconciler with no sources and default settings
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cluster,
            notifier,
            clock,
            sources: Vec::new(),
            recipients: RecipientSettings::default(),
            engine: EngineSettings::default(),
        }
    }

    /// Create a reconciler with the secret, endpoint and filesystem sources
    pub fn from_settings(
        settings: &Settings,
        cluster: Arc<dyn ClusterClient>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MonitorError> {
        let endpoint = EndpointSource::new(&settings.endpoint)?;

        Ok(Self::new(cluster.clone(), notifier, clock)
            .with_source(Arc::new(SecretSource::new(cluster)))
            .with_source(Arc::new(endpoint))
            .with_source(Arc::new(FilesystemSource::new(&settings.filesystem)))
            .with_recipients(settings.recipients.clone())
            .with_engine(settings.engine.clone()))
    }

    pub fn with_source(mut self, source: Arc<dyn CertificateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_recipients(mut self, recipients: RecipientSettings) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_engine(mut self, engine: EngineSettings) -> Self {
        self.engine = engine;
        self
    }

    /// Run one cycle for the named monitor.
    ///
    /// Returns `Ok(None)` when the monitor no longer exists. On error nothing
    /// has been written.
    pub async fn reconcile(&self, name: &str) -> CycleResult {
        let Some(monitor) = self.cluster.get_monitor(name).await? else {
            tracing::info!("Monitor {} not found, nothing to do", name);
            return Ok(None);
        };

        let policy = monitor.spec.cooldown_policy()?;
        let requeue_after = monitor
            .spec
            .requeue_after(self.engine.default_check_interval);
        let now = self.clock.now();
        let prior = MonitorSnapshot::from_status(&monitor.status);

        tracing::debug!(
            monitor = %name,
            version = %monitor.resource_version,
            prior_entries = prior.len(),
            "Starting cycle"
        );

        let (observations, skipped) = self.discover(&monitor).await?;

        let mut totals = StatusTotals::default();
        let mut deltas = Vec::with_capacity(observations.len());
        let mut due = Vec::new();

        for observation in observations {
            let status = observation.status(now, policy.warning_threshold);
            totals.record(status);

            let state = prior.notification_state(&observation.qualified_name());
            if policy.notify_enabled && should_notify(&state, status, now, policy.cooldown_period) {
                due.push(deltas.len());
            }

            deltas.push(CycleDelta {
                observation,
                status,
                notified_at: None,
            });
        }

        let notified = self.notify_due(&mut deltas, &due, now).await;

        let status = self
            .persist(name, monitor, &deltas, now, &policy)
            .await?;

        tracing::info!(
            monitor = %name,
            "cert summary: total={} valid={} expiring={} expired={} skipped={} notified={}",
            totals.total,
            totals.valid,
            totals.expiring,
            totals.expired,
            skipped,
            notified.len()
        );

        Ok(Some(CycleReport {
            monitor: name.to_string(),
            status,
            notified,
            totals,
            skipped,
            requeue_after,
        }))
    }

    /// Enumerate and parse candidates from every enabled source
    async fn discover(
        &self,
        monitor: &CertificateMonitor,
    ) -> Result<(Vec<CertificateObservation>, usize), MonitorError> {
        let enabled = monitor.spec.enabled_sources();
        let active: Vec<&Arc<dyn CertificateSource>> = self
            .sources
            .iter()
            .filter(|s| enabled.contains(&s.kind()))
            .collect();

        let listings = futures::future::join_all(
            active
                .iter()
                .map(|source| async move { (source.kind(), source.list_candidates(&monitor.spec).await) }),
        )
        .await;

        let mut observations = Vec::new();
        let mut seen = HashSet::new();
        let mut skipped = 0;

        for (kind, listing) in listings {
            let candidates = listing.inspect_err(|e| {
                tracing::error!("Discovery failed for {} source: {}", kind, e);
            })?;

            tracing::debug!("{} source returned {} candidate(s)", kind, candidates.len());

            for candidate in candidates {
                match to_observation(kind, candidate) {
                    // First occurrence wins
                    Ok(observation) if !seen.insert(observation.qualified_name()) => {
                        tracing::debug!(
                            "Ignoring duplicate {} certificate {}",
                            kind,
                            observation.qualified_name()
                        );
                    }
                    Ok(observation) => observations.push(observation),
                    Err(e) if e.is_item_level() => {
                        tracing::warn!("Skipping {} certificate: {}", kind, e);
                        skipped += 1;
                    }
                    Err(e) => {
                        tracing::error!("Unexpected error for {} certificate: {}", kind, e);
                        skipped += 1;
                    }
                }
            }
        }

        Ok((observations, skipped))
    }

    /// Send notifications for the deltas at `due`, marking the delivered ones
    async fn notify_due(
        &self,
        deltas: &mut [CycleDelta],
        due: &[usize],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        if due.is_empty() {
            return Vec::new();
        }

        let recipients = match alerts::resolve_recipients(self.cluster.as_ref(), &self.recipients).await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::warn!("Cannot resolve notification recipients: {}", e);
                return Vec::new();
            }
        };

        let notifier = self.notifier.as_ref();
        let tasks = due.iter().filter_map(|&index| {
            let delta = &deltas[index];
            let notification = Notification::for_certificate(&delta.observation, delta.status, now)?;
            let recipients = &recipients;
            Some(async move {
                let result = alerts::deliver(notifier, &notification, recipients).await;
                (index, notification.identity, result)
            })
        });

        let results = futures::future::join_all(tasks).await;

        let mut notified = Vec::new();
        for (index, identity, result) in results {
            match result {
                Ok(_) => {
                    deltas[index].notified_at = Some(now);
                    notified.push(identity);
                }
                Err(e) => {
                    tracing::warn!("Notification for {} not delivered: {}", identity, e);
                }
            }
        }

        notified.sort();
        notified
    }

    /// Write the merged snapshot, re-reading and replaying on conflict
    async fn persist(
        &self,
        name: &str,
        initial: CertificateMonitor,
        deltas: &[CycleDelta],
        now: DateTime<Utc>,
        policy: &CooldownPolicy,
    ) -> Result<MonitorStatus, MonitorError> {
        let initial = Mutex::new(Some(initial));
        let initial = &initial;
        let cluster = self.cluster.as_ref();
        let warning_threshold = policy.warning_threshold;

        let result = retry_with_backoff(
            &self.engine.persist_retry,
            ClusterError::is_conflict,
            move || {
                let cached = initial.lock().ok().and_then(|mut slot| slot.take());
                async move {
                    let current = match cached {
                        Some(monitor) => monitor,
                        None => cluster
                            .get_monitor(name)
                            .await?
                            .ok_or_else(|| ClusterError::not_found("CertificateMonitor", name))?,
                    };

                    let prior = MonitorSnapshot::from_status(&current.status);
                    let status = merge(&prior, deltas).to_status(now, warning_threshold);

                    cluster
                        .update_status(name, status.clone(), &current.resource_version)
                        .await?;
                    Ok::<_, ClusterError>(status)
                }
            },
        )
        .await;

        result.map_err(|RetryError { attempts, error }| {
            tracing::error!("Failed to persist status for {} after {} attempt(s): {}", name, attempts, error);
            MonitorError::Persist {
                attempts,
                details: error.to_string(),
            }
        })
    }
}

fn to_observation(
    kind: SourceKind,
    candidate: crate::sources::Candidate,
) -> Result<CertificateObservation, MonitorError> {
    let raw = candidate.material?;
    let parsed = parser::parse(&raw)?;

    Ok(CertificateObservation {
        identity: candidate.identity,
        source_kind: kind,
        namespace: candidate.namespace,
        subject: parsed.subject,
        not_after: parsed.not_after,
    })
}
