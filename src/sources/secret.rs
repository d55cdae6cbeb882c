// Secret-backed certificate source

use super::{Candidate, CertificateSource};
use crate::certificates::RawCertificate;
use crate::cluster::{ClusterClient, SecretRef, TLS_CERT_KEY, TLS_SECRET_TYPE};
use crate::error::MonitorError;
use crate::monitor::config::MonitorSpec;
use crate::monitor::types::SourceKind;
use async_trait::async_trait;
use std::sync::Arc;

/// Reads `tls.crt` from every TLS secret in the cluster
pub struct SecretSource {
    cluster: Arc<dyn ClusterClient>,
}

impl SecretSource {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    async fn fetch(&self, secret_ref: SecretRef) -> Candidate {
        let secret = match self
            .cluster
            .get_secret(&secret_ref.namespace, &secret_ref.name)
            .await
        {
            Ok(secret) => secret,
            Err(e) => {
                return Candidate::failed(secret_ref.name, secret_ref.namespace, e.to_string());
            }
        };

        match secret.data.get(TLS_CERT_KEY) {
            Some(bytes) if !bytes.is_empty() => Candidate::ok(
                secret_ref.name,
                secret_ref.namespace,
                RawCertificate::Pem(bytes.clone()),
            ),
            _ => Candidate::failed(
                secret_ref.name,
                secret_ref.namespace,
                format!("secret has no {} data", TLS_CERT_KEY),
            ),
        }
    }
}

#[async_trait]
impl CertificateSource for SecretSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Secret
    }

    async fn list_candidates(&self, _spec: &MonitorSpec) -> Result<Vec<Candidate>, MonitorError> {
        let refs = self
            .cluster
            .list_secrets_by_type(TLS_SECRET_TYPE)
            .await
            .map_err(|e| MonitorError::discovery(SourceKind::Secret, e.to_string()))?;

        tracing::debug!("Found {} TLS secret(s)", refs.len());

        let fetches = refs.into_iter().map(|r| self.fetch(r));
        Ok(futures::future::join_all(fetches).await)
    }
}
