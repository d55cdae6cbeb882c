// Certificate sources - Discover raw certificate material
//
// Each source enumerates candidates for one SourceKind. Enumeration failure is
// returned as an error; a single unreadable candidate is carried inside its
// `Candidate` so the reconciler can skip it and keep going.

pub mod endpoint;
pub mod filesystem;
pub mod secret;

use crate::certificates::RawCertificate;
use crate::error::MonitorError;
use crate::monitor::config::MonitorSpec;
use crate::monitor::types::SourceKind;
use async_trait::async_trait;

pub use endpoint::EndpointSource;
pub use filesystem::FilesystemSource;
pub use secret::SecretSource;

/// Namespace recorded for endpoint certificates
pub const EXTERNAL_NAMESPACE: &str = "external";

/// One discovered certificate, or the reason it could not be read
#[derive(Debug)]
pub struct Candidate {
    pub identity: String,
    pub namespace: String,
    pub material: Result<RawCertificate, MonitorError>,
}

impl Candidate {
    pub fn ok(identity: impl Into<String>, namespace: impl Into<String>, raw: RawCertificate) -> Self {
        Self {
            identity: identity.into(),
            namespace: namespace.into(),
            material: Ok(raw),
        }
    }

    pub fn failed(identity: impl Into<String>, namespace: impl Into<String>, details: impl Into<String>) -> Self {
        let identity = identity.into();
        let namespace = namespace.into();
        let material = Err(MonitorError::fetch(format!("{}.{}", namespace, identity), details));
        Self {
            identity,
            namespace,
            material,
        }
    }
}

/// A place certificates can be discovered
#[async_trait]
pub trait CertificateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Enumerate every candidate this source knows about for `spec`
    async fn list_candidates(&self, spec: &MonitorSpec) -> Result<Vec<Candidate>, MonitorError>;
}
