// Endpoint-backed certificate source - Reads the leaf certificate from a TLS handshake

use super::{Candidate, CertificateSource, EXTERNAL_NAMESPACE};
use crate::certificates::RawCertificate;
use crate::error::MonitorError;
use crate::monitor::config::{EndpointSettings, MonitorSpec};
use crate::monitor::types::SourceKind;
use async_trait::async_trait;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

const DEFAULT_TLS_PORT: u16 = 443;

/// Connects to each configured endpoint and captures its certificate
pub struct EndpointSource {
    connector: TlsConnector,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl EndpointSource {
    pub fn new(settings: &EndpointSettings) -> Result<Self, MonitorError> {
        // Chain validation is skipped: expired and self-signed certificates
        // still have to be read.
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| MonitorError::config(format!("TLS configuration: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            connect_timeout: Duration::from_secs(settings.connect_timeout_seconds),
            handshake_timeout: Duration::from_secs(settings.handshake_timeout_seconds),
        })
    }

    async fn fetch(&self, endpoint: &str) -> Candidate {
        match self.fetch_leaf(endpoint).await {
            Ok(der) => Candidate::ok(endpoint, EXTERNAL_NAMESPACE, RawCertificate::Der(der)),
            Err(details) => {
                tracing::debug!("Endpoint {} unreachable: {}", endpoint, details);
                Candidate::failed(endpoint, EXTERNAL_NAMESPACE, details)
            }
        }
    }

    async fn fetch_leaf(&self, endpoint: &str) -> Result<Vec<u8>, String> {
        let (host, port) = parse_endpoint(endpoint)?;

        let stream = timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| format!("connect timed out after {:?}", self.connect_timeout))?
            .map_err(|e| format!("connect failed: {}", e))?;

        let server_name = ServerName::try_from(host.as_str())
            .map_err(|_| format!("invalid server name: {}", host))?
            .to_owned();

        let tls_stream = timeout(self.handshake_timeout, self.connector.connect(server_name, stream))
            .await
            .map_err(|_| format!("TLS handshake timed out after {:?}", self.handshake_timeout))?
            .map_err(|e| format!("TLS handshake failed: {}", e))?;

        let (_io, connection) = tls_stream.into_inner();
        connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .map(|leaf| leaf.as_ref().to_vec())
            .ok_or_else(|| "no certificates received from server".to_string())
    }
}

#[async_trait]
impl CertificateSource for EndpointSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Endpoint
    }

    async fn list_candidates(&self, spec: &MonitorSpec) -> Result<Vec<Candidate>, MonitorError> {
        let fetches = spec.endpoints.iter().map(|e| self.fetch(e));
        Ok(futures::future::join_all(fetches).await)
    }
}

/// Split an endpoint into host and port.
///
/// Accepts `https://host[:port][/path]` or bare `host[:port]`.
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), String> {
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let url = Url::parse(&with_scheme).map_err(|e| format!("invalid endpoint '{}': {}", endpoint, e))?;

    let host = match url.host() {
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(format!("endpoint '{}' has no host", endpoint)),
    };

    let port = url.port_or_known_default().unwrap_or(DEFAULT_TLS_PORT);
    Ok((host, port))
}

/// Accepts any server certificate
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
