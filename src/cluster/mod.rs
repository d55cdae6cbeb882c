// Cluster capability interface
//
// The engine only needs a handful of reads and one conditional write, so it
// depends on this narrow trait rather than a full API client.

pub mod memory;

use crate::error::ClusterError;
use crate::monitor::config::MonitorSpec;
use crate::monitor::types::MonitorStatus;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use memory::InMemoryCluster;

/// Secret type holding a TLS key pair
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Data key holding the certificate in a TLS secret
pub const TLS_CERT_KEY: &str = "tls.crt";

/// A monitored resource as stored by the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMonitor {
    pub name: String,
    pub spec: MonitorSpec,
    pub status: MonitorStatus,
    /// Opaque version used for conditional writes
    pub resource_version: String,
}

/// Reference to a secret returned by a listing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    pub secret_type: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigMap {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

/// Operations the engine performs against the cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a monitored resource, `None` when it does not exist
    async fn get_monitor(&self, name: &str) -> Result<Option<CertificateMonitor>, ClusterError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError>;

    /// List secrets of the given type across all namespaces
    async fn list_secrets_by_type(&self, secret_type: &str) -> Result<Vec<SecretRef>, ClusterError>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError>;

    /// Replace the status of a monitor if its version still equals
    /// `expected_version`, returning the new version.
    ///
    /// Fails with [`ClusterError::Conflict`] on a version mismatch.
    async fn update_status(
        &self,
        name: &str,
        status: MonitorStatus,
        expected_version: &str,
    ) -> Result<String, ClusterError>;
}
