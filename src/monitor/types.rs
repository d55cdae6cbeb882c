// Core types for certificate monitoring

use crate::monitor::classifier::classify;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Origin category of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Secret,
    Endpoint,
    Filesystem,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Secret => "secret",
            SourceKind::Endpoint => "endpoint",
            SourceKind::Filesystem => "filesystem",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secret" => Ok(SourceKind::Secret),
            "endpoint" => Ok(SourceKind::Endpoint),
            "filesystem" => Ok(SourceKind::Filesystem),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// Validity classification of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Valid,
    Expiring,
    Expired,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Valid => "valid",
            CertificateStatus::Expiring => "expiring",
            CertificateStatus::Expired => "expired",
        }
    }

    pub fn is_problem(&self) -> bool {
        !matches!(self, CertificateStatus::Valid)
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "valid" => Ok(CertificateStatus::Valid),
            "expiring" => Ok(CertificateStatus::Expiring),
            "expired" => Ok(CertificateStatus::Expired),
            other => Err(format!("unknown certificate status: {}", other)),
        }
    }
}

/// Build the snapshot key `<sourceKind>-<namespace>.<identity>`
pub fn qualified_name(kind: SourceKind, namespace: &str, identity: &str) -> String {
    format!("{}-{}.{}", kind, namespace, identity)
}

/// A certificate seen during one cycle
///
/// `status` is not stored: it is always recomputed from `not_after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateObservation {
    pub identity: String,
    pub source_kind: SourceKind,
    pub namespace: String,
    pub subject: String,
    pub not_after: DateTime<Utc>,
}

impl CertificateObservation {
    pub fn qualified_name(&self) -> String {
        qualified_name(self.source_kind, &self.namespace, &self.identity)
    }

    /// Short label used in messages, e.g. `default.web-tls`
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.namespace, self.identity)
    }

    pub fn status(&self, now: DateTime<Utc>, warning_threshold: Duration) -> CertificateStatus {
        classify(self.not_after, now, warning_threshold)
    }
}

/// The last notification that fired for an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastNotification {
    pub at: DateTime<Utc>,
    pub status: CertificateStatus,
}

/// Durable per-identity notification state
///
/// Time and status are held together so one can never be set without the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationState {
    last: Option<LastNotification>,
}

impl NotificationState {
    pub fn never() -> Self {
        Self { last: None }
    }

    pub fn notified(at: DateTime<Utc>, status: CertificateStatus) -> Self {
        Self {
            last: Some(LastNotification { at, status }),
        }
    }

    pub fn last_notified_at(&self) -> Option<DateTime<Utc>> {
        self.last.map(|l| l.at)
    }

    pub fn last_notified_status(&self) -> Option<CertificateStatus> {
        self.last.map(|l| l.status)
    }

    pub fn is_notified(&self) -> bool {
        self.last.is_some()
    }
}

/// One entry of the durable snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub source_kind: SourceKind,
    pub namespace: String,
    pub not_after: DateTime<Utc>,
    pub notification: NotificationState,
}

/// Aggregate durable state of one monitored resource, ordered by name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitorSnapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

impl MonitorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry with the same name
    pub fn upsert(&mut self, entry: SnapshotEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.get(name)
    }

    pub fn notification_state(&self, name: &str) -> NotificationState {
        self.entries
            .get(name)
            .map(|e| e.notification)
            .unwrap_or_default()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the persisted status, deriving each status from its expiry
    pub fn to_status(&self, now: DateTime<Utc>, warning_threshold: Duration) -> MonitorStatus {
        let monitored_certificates = self
            .entries
            .values()
            .map(|entry| MonitoredCertificateStatus {
                name: entry.name.clone(),
                status: classify(entry.not_after, now, warning_threshold),
                expiry: entry.not_after.to_rfc3339_opts(SecondsFormat::Secs, true),
                namespace: entry.namespace.clone(),
                email_sent: entry.notification.is_notified(),
                last_email_sent_at: entry
                    .notification
                    .last_notified_at()
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_default(),
                last_email_status: entry.notification.last_notified_status(),
            })
            .collect();

        MonitorStatus {
            monitored_certificates,
        }
    }

    /// Rebuild a snapshot from a persisted status
    ///
    /// Entries whose name or expiry cannot be read are dropped. An unreadable
    /// `lastEmailSentAt` is treated as never notified.
    pub fn from_status(status: &MonitorStatus) -> Self {
        let mut snapshot = Self::new();

        for cert in &status.monitored_certificates {
            let Some(source_kind) = cert
                .name
                .split_once('-')
                .and_then(|(kind, _)| kind.parse::<SourceKind>().ok())
            else {
                tracing::debug!("Dropping status entry with unknown source kind: {}", cert.name);
                continue;
            };

            let not_after = match DateTime::parse_from_rfc3339(&cert.expiry) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(e) => {
                    tracing::debug!("Dropping status entry {} with bad expiry: {}", cert.name, e);
                    continue;
                }
            };

            let notification = if cert.email_sent {
                match DateTime::parse_from_rfc3339(&cert.last_email_sent_at) {
                    Ok(at) => NotificationState::notified(
                        at.with_timezone(&Utc),
                        cert.last_email_status.unwrap_or(cert.status),
                    ),
                    Err(_) => NotificationState::never(),
                }
            } else {
                NotificationState::never()
            };

            snapshot.upsert(SnapshotEntry {
                name: cert.name.clone(),
                source_kind,
                namespace: cert.namespace.clone(),
                not_after,
                notification,
            });
        }

        snapshot
    }
}

/// Persisted status of a single certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredCertificateStatus {
    pub name: String,
    pub status: CertificateStatus,
    pub expiry: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub email_sent: bool,
    #[serde(default)]
    pub last_email_sent_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_email_status: Option<CertificateStatus>,
}

/// Observed state of a monitored resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    #[serde(default)]
    pub monitored_certificates: Vec<MonitoredCertificateStatus>,
}

/// Per-status totals for a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub total: usize,
    pub valid: usize,
    pub expiring: usize,
    pub expired: usize,
}

impl StatusTotals {
    pub fn record(&mut self, status: CertificateStatus) {
        self.total += 1;
        match status {
            CertificateStatus::Valid => self.valid += 1,
            CertificateStatus::Expiring => self.expiring += 1,
            CertificateStatus::Expired => self.expired += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_qualified_name_format() {
        assert_eq!(
            qualified_name(SourceKind::Secret, "default", "web-tls"),
            "secret-default.web-tls"
        );
        assert_eq!(
            qualified_name(SourceKind::Filesystem, "node-1", "/etc/kubernetes/pki/ca.crt"),
            "filesystem-node-1./etc/kubernetes/pki/ca.crt"
        );
    }

    #[test]
    fn test_status_display_and_parse() {
        assert_eq!(CertificateStatus::Expiring.to_string(), "expiring");
        assert_eq!("EXPIRED".parse::<CertificateStatus>(), Ok(CertificateStatus::Expired));
        assert!("error".parse::<CertificateStatus>().is_err());
    }

    #[test]
    fn test_notification_state_invariant() {
        let never = NotificationState::never();
        assert!(never.last_notified_at().is_none());
        assert!(never.last_notified_status().is_none());

        let sent = NotificationState::notified(ts(1_000), CertificateStatus::Expired);
        assert_eq!(sent.last_notified_at(), Some(ts(1_000)));
        assert_eq!(sent.last_notified_status(), Some(CertificateStatus::Expired));
    }

    #[test]
    fn test_status_round_trip_keeps_notification_state() {
        let mut snapshot = MonitorSnapshot::new();
        snapshot.upsert(SnapshotEntry {
            name: "secret-default.web".to_string(),
            source_kind: SourceKind::Secret,
            namespace: "default".to_string(),
            not_after: ts(2_000_000),
            notification: NotificationState::notified(ts(1_000), CertificateStatus::Expiring),
        });
        snapshot.upsert(SnapshotEntry {
            name: "endpoint-external.https://example.com".to_string(),
            source_kind: SourceKind::Endpoint,
            namespace: "external".to_string(),
            not_after: ts(9_000_000),
            notification: NotificationState::never(),
        });

        let status = snapshot.to_status(ts(1_500), Duration::days(30));
        assert_eq!(status.monitored_certificates.len(), 2);
        // BTreeMap ordering
        assert_eq!(
            status.monitored_certificates[0].name,
            "endpoint-external.https://example.com"
        );
        assert!(!status.monitored_certificates[0].email_sent);
        assert_eq!(status.monitored_certificates[0].last_email_sent_at, "");

        let restored = MonitorSnapshot::from_status(&status);
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_from_status_unparseable_sent_time_means_never_notified() {
        let status = MonitorStatus {
            monitored_certificates: vec![MonitoredCertificateStatus {
                name: "secret-default.web".to_string(),
                status: CertificateStatus::Expired,
                expiry: "2024-01-01T00:00:00Z".to_string(),
                namespace: "default".to_string(),
                email_sent: true,
                last_email_sent_at: "yesterday".to_string(),
                last_email_status: None,
            }],
        };

        let snapshot = MonitorSnapshot::from_status(&status);
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.notification_state("secret-default.web").is_notified());
    }

    #[test]
    fn test_from_status_drops_unreadable_entries() {
        let status = MonitorStatus {
            monitored_certificates: vec![
                MonitoredCertificateStatus {
                    name: "internal-default.legacy".to_string(),
                    status: CertificateStatus::Valid,
                    expiry: "2030-01-01T00:00:00Z".to_string(),
                    namespace: "default".to_string(),
                    email_sent: false,
                    last_email_sent_at: String::new(),
                    last_email_status: None,
                },
                MonitoredCertificateStatus {
                    name: "secret-default.web".to_string(),
                    status: CertificateStatus::Valid,
                    expiry: "not a date".to_string(),
                    namespace: "default".to_string(),
                    email_sent: false,
                    last_email_sent_at: String::new(),
                    last_email_status: None,
                },
            ],
        };

        assert!(MonitorSnapshot::from_status(&status).is_empty());
    }

    #[test]
    fn test_status_serialization_is_camel_case() {
        let status = MonitorStatus {
            monitored_certificates: vec![MonitoredCertificateStatus {
                name: "secret-default.web".to_string(),
                status: CertificateStatus::Expiring,
                expiry: "2025-01-01T00:00:00Z".to_string(),
                namespace: "default".to_string(),
                email_sent: true,
                last_email_sent_at: "2024-12-20T00:00:00Z".to_string(),
                last_email_status: Some(CertificateStatus::Expiring),
            }],
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"monitoredCertificates\""));
        assert!(json.contains("\"emailSent\":true"));
        assert!(json.contains("\"lastEmailSentAt\""));
        assert!(json.contains("\"status\":\"expiring\""));
    }

    #[test]
    fn test_status_totals() {
        let mut totals = StatusTotals::default();
        totals.record(CertificateStatus::Valid);
        totals.record(CertificateStatus::Expired);
        totals.record(CertificateStatus::Expired);

        assert_eq!(totals.total, 3);
        assert_eq!(totals.valid, 1);
        assert_eq!(totals.expiring, 0);
        assert_eq!(totals.expired, 2);
    }
}
