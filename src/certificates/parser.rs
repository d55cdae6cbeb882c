// Certificate Parser - Decode PEM/DER material and extract canonical fields

use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

/// Raw certificate material as handed over by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCertificate {
    /// Text containing one or more PEM blocks, leaf first
    Pem(Vec<u8>),
    /// A single DER-encoded certificate
    Der(Vec<u8>),
}

/// Fields extracted from a leaf certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCertificate {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub san: Vec<String>,
}

/// Parse raw material into a [`ParsedCertificate`]
pub fn parse(raw: &RawCertificate) -> Result<ParsedCertificate, MonitorError> {
    match raw {
        RawCertificate::Pem(bytes) => parse_pem(bytes),
        RawCertificate::Der(bytes) => parse_der(bytes),
    }
}

/// Parse the first PEM block of `data`, which must be a certificate
pub fn parse_pem(data: &[u8]) -> Result<ParsedCertificate, MonitorError> {
    let pem = match Pem::iter_from_buffer(data).next() {
        Some(Ok(pem)) => pem,
        Some(Err(e)) => {
            return Err(MonitorError::decode(format!("invalid PEM data: {:?}", e)));
        }
        None => return Err(MonitorError::decode("no PEM block found")),
    };

    if pem.label != "CERTIFICATE" {
        return Err(MonitorError::decode(format!(
            "first PEM block is '{}', expected 'CERTIFICATE'",
            pem.label
        )));
    }

    parse_der(&pem.contents)
}

/// Parse a single DER-encoded certificate
pub fn parse_der(der_bytes: &[u8]) -> Result<ParsedCertificate, MonitorError> {
    let (_, cert) = X509Certificate::from_der(der_bytes)
        .map_err(|e| MonitorError::parse(format!("failed to parse certificate: {:?}", e)))?;

    let validity = cert.validity();
    let not_before = to_utc(validity.not_before.timestamp())?;
    let not_after = to_utc(validity.not_after.timestamp())?;

    let mut san = Vec::new();
    if let Ok(Some(ext)) = cert.subject_alternative_name() {
        for name in &ext.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                san.push(dns.to_string());
            }
        }
    }

    Ok(ParsedCertificate {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: format!("{:x}", cert.serial),
        not_before,
        not_after,
        san,
    })
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, MonitorError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| MonitorError::parse(format!("validity timestamp out of range: {}", timestamp)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};

    fn self_signed(cn: &str, not_after: ::time::OffsetDateTime) -> rcgen::Certificate {
        let mut params = CertificateParams::new(vec![format!("{}.example.com", cn)]).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.not_before = ::time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        params.not_after = not_after;
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap()
    }

    #[test]
    fn test_parse_pem_extracts_fields() {
        let not_after = ::time::OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap();
        let cert = self_signed("web", not_after);

        let parsed = parse_pem(cert.pem().as_bytes()).unwrap();
        assert!(parsed.subject.contains("web"));
        assert_eq!(parsed.not_after.timestamp(), 1_900_000_000);
        assert_eq!(parsed.not_before.timestamp(), 1_700_000_000);
        assert_eq!(parsed.san, vec!["web.example.com".to_string()]);
    }

    #[test]
    fn test_parse_der_matches_pem() {
        let not_after = ::time::OffsetDateTime::from_unix_timestamp(1_800_000_000).unwrap();
        let cert = self_signed("api", not_after);

        let from_der = parse(&RawCertificate::Der(cert.der().to_vec())).unwrap();
        let from_pem = parse(&RawCertificate::Pem(cert.pem().into_bytes())).unwrap();
        assert_eq!(from_der, from_pem);
    }

    #[test]
    fn test_bundle_uses_first_certificate() {
        let leaf = self_signed(
            "leaf",
            ::time::OffsetDateTime::from_unix_timestamp(1_750_000_000).unwrap(),
        );
        let ca = self_signed(
            "ca",
            ::time::OffsetDateTime::from_unix_timestamp(2_000_000_000).unwrap(),
        );
        let bundle = format!("{}{}", leaf.pem(), ca.pem());

        let parsed = parse_pem(bundle.as_bytes()).unwrap();
        assert_eq!(parsed.not_after.timestamp(), 1_750_000_000);
    }

    #[test]
    fn test_no_pem_block_is_decode_error() {
        let err = parse_pem(b"this is not a certificate").unwrap_err();
        assert!(matches!(err, MonitorError::Decode { .. }));

        let err = parse_pem(b"").unwrap_err();
        assert!(matches!(err, MonitorError::Decode { .. }));
    }

    #[test]
    fn test_non_certificate_block_is_decode_error() {
        let key = KeyPair::generate().unwrap();
        let err = parse_pem(key.serialize_pem().as_bytes()).unwrap_err();
        assert!(matches!(err, MonitorError::Decode { .. }));
    }

    #[test]
    fn test_malformed_der_is_parse_error() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAECAwQFBgcICQ==\n-----END CERTIFICATE-----\n";
        let err = parse_pem(pem.as_bytes()).unwrap_err();
        assert!(matches!(err, MonitorError::Parse { .. }));

        let err = parse_der(&[0x30, 0x03, 0x02, 0x01]).unwrap_err();
        assert!(matches!(err, MonitorError::Parse { .. }));
    }
}
