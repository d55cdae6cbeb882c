// In-memory cluster store
//
// Backs the standalone daemon and tests. Versions are monotonically
// increasing integers rendered as strings.

use super::{CertificateMonitor, ClusterClient, ConfigMap, Secret, SecretRef};
use crate::error::ClusterError;
use crate::monitor::config::MonitorSpec;
use crate::monitor::types::MonitorStatus;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    monitors: BTreeMap<String, StoredMonitor>,
    secrets: BTreeMap<(String, String), Secret>,
    config_maps: BTreeMap<(String, String), ConfigMap>,
    next_version: u64,
    // failure injection
    pending_conflicts: usize,
    concurrent_writes: VecDeque<MonitorStatus>,
    fail_listing: Option<String>,
    unreadable_secrets: BTreeSet<(String, String)>,
    status_writes: usize,
}

#[derive(Debug, Clone)]
struct StoredMonitor {
    spec: MonitorSpec,
    status: MonitorStatus,
    version: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

/// Cluster state held in process memory
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: RwLock<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the spec of a monitor, keeping its status
    pub async fn apply_monitor(&self, name: &str, spec: MonitorSpec) {
        let mut state = self.state.write().await;
        let version = state.bump();
        let status = state
            .monitors
            .get(name)
            .map(|m| m.status.clone())
            .unwrap_or_default();
        state
            .monitors
            .insert(name.to_string(), StoredMonitor { spec, status, version });
    }

    pub async fn delete_monitor(&self, name: &str) {
        self.state.write().await.monitors.remove(name);
    }

    pub async fn monitor_status(&self, name: &str) -> Option<MonitorStatus> {
        self.state
            .read()
            .await
            .monitors
            .get(name)
            .map(|m| m.status.clone())
    }

    pub async fn put_secret(&self, secret: Secret) {
        let key = (secret.namespace.clone(), secret.name.clone());
        self.state.write().await.secrets.insert(key, secret);
    }

    pub async fn delete_secret(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .await
            .secrets
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub async fn put_config_map(&self, config_map: ConfigMap) {
        let key = (config_map.namespace.clone(), config_map.name.clone());
        self.state.write().await.config_maps.insert(key, config_map);
    }

    /// Make the next `count` status writes fail with a conflict
    pub async fn inject_conflicts(&self, count: usize) {
        self.state.write().await.pending_conflicts = count;
    }

    /// Make the next status write lose to another writer that stores `status`
    /// first. Queued writes are applied one per conflict.
    pub async fn inject_concurrent_write(&self, status: MonitorStatus) {
        let mut state = self.state.write().await;
        state.pending_conflicts += 1;
        state.concurrent_writes.push_back(status);
    }

    /// Make secret listing fail with the given message, or succeed again with `None`
    pub async fn fail_secret_listing(&self, message: Option<&str>) {
        self.state.write().await.fail_listing = message.map(str::to_string);
    }

    /// Make reads of one secret fail while it still shows up in listings
    pub async fn make_secret_unreadable(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .await
            .unreadable_secrets
            .insert((namespace.to_string(), name.to_string()));
    }

    /// Number of successful status writes
    pub async fn status_writes(&self) -> usize {
        self.state.read().await.status_writes
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_monitor(&self, name: &str) -> Result<Option<CertificateMonitor>, ClusterError> {
        let state = self.state.read().await;
        Ok(state.monitors.get(name).map(|m| CertificateMonitor {
            name: name.to_string(),
            spec: m.spec.clone(),
            status: m.status.clone(),
            resource_version: m.version.to_string(),
        }))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        let state = self.state.read().await;
        let key = (namespace.to_string(), name.to_string());
        if state.unreadable_secrets.contains(&key) {
            return Err(ClusterError::Api(format!(
                "secrets \"{}\" is forbidden in namespace \"{}\"",
                name, namespace
            )));
        }
        state
            .secrets
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Secret", format!("{}/{}", namespace, name)))
    }

    async fn list_secrets_by_type(&self, secret_type: &str) -> Result<Vec<SecretRef>, ClusterError> {
        let state = self.state.read().await;
        if let Some(message) = &state.fail_listing {
            return Err(ClusterError::Api(message.clone()));
        }
        Ok(state
            .secrets
            .values()
            .filter(|s| s.secret_type == secret_type)
            .map(|s| SecretRef {
                namespace: s.namespace.clone(),
                name: s.name.clone(),
            })
            .collect())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError> {
        let state = self.state.read().await;
        state
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("ConfigMap", format!("{}/{}", namespace, name)))
    }

    async fn update_status(
        &self,
        name: &str,
        status: MonitorStatus,
        expected_version: &str,
    ) -> Result<String, ClusterError> {
        let mut state = self.state.write().await;

        let current = state
            .monitors
            .get(name)
            .map(|m| m.version)
            .ok_or_else(|| ClusterError::not_found("CertificateMonitor", name))?;

        if state.pending_conflicts > 0 {
            // Simulate a concurrent writer bumping the version
            state.pending_conflicts -= 1;
            let version = state.bump();
            let concurrent = state.concurrent_writes.pop_front();
            if let Some(monitor) = state.monitors.get_mut(name) {
                monitor.version = version;
                if let Some(status) = concurrent {
                    monitor.status = status;
                }
            }
            return Err(ClusterError::Conflict {
                name: name.to_string(),
                expected: expected_version.to_string(),
                actual: version.to_string(),
            });
        }

        if current.to_string() != expected_version {
            return Err(ClusterError::Conflict {
                name: name.to_string(),
                expected: expected_version.to_string(),
                actual: current.to_string(),
            });
        }

        let version = state.bump();
        state.status_writes += 1;
        if let Some(monitor) = state.monitors.get_mut(name) {
            monitor.status = status;
            monitor.version = version;
        }
        Ok(version.to_string())
    }
}
