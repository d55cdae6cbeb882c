// Alert System - Notification composition and delivery

pub mod email;

use crate::cluster::ClusterClient;
use crate::error::MonitorError;
use crate::monitor::classifier::days_remaining;
use crate::monitor::config::RecipientSettings;
use crate::monitor::types::{CertificateObservation, CertificateStatus};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

pub use email::SmtpNotifier;

/// A message about one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub identity: String,
    pub status: CertificateStatus,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Compose the message for a problem certificate, `None` when it is valid
    pub fn for_certificate(
        observation: &CertificateObservation,
        status: CertificateStatus,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let name = observation.display_name();
        let expiry = observation
            .not_after
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let (subject, body) = match status {
            CertificateStatus::Valid => return None,
            CertificateStatus::Expiring => {
                let days = days_remaining(observation.not_after, now);
                (
                    format!("Certificate Expiring in {} days: {}", days, name),
                    format!(
                        "The certificate {} is expiring on {}. {} days left",
                        name, expiry, days
                    ),
                )
            }
            CertificateStatus::Expired => (
                format!("Certificate Expired: {}", name),
                format!("The certificate {} has expired on {}.", name, expiry),
            ),
        };

        Some(Self {
            identity: observation.qualified_name(),
            status,
            subject,
            body,
        })
    }
}

/// Delivers a notification to a single recipient
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification, recipient: &str) -> Result<(), MonitorError>;

    /// Get the notifier name for logging
    fn notifier_name(&self) -> &str;
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification, recipient: &str) -> Result<(), MonitorError> {
        tracing::info!(
            recipient = %recipient,
            identity = %notification.identity,
            "{}",
            notification.subject
        );
        Ok(())
    }

    fn notifier_name(&self) -> &str {
        "log"
    }
}

/// Read the recipient list from its config map
pub async fn resolve_recipients(
    cluster: &dyn ClusterClient,
    settings: &RecipientSettings,
) -> Result<Vec<String>, MonitorError> {
    let location = format!(
        "{}/{}",
        settings.config_map_namespace, settings.config_map_name
    );

    let config_map = cluster
        .get_config_map(&settings.config_map_namespace, &settings.config_map_name)
        .await
        .map_err(|e| MonitorError::notify(&location, e.to_string()))?;

    let raw = config_map.data.get(&settings.key).ok_or_else(|| {
        MonitorError::notify(&location, format!("missing key '{}'", settings.key))
    })?;

    let recipients: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        MonitorError::notify(&location, format!("key '{}' is not a JSON string array: {}", settings.key, e))
    })?;

    Ok(recipients
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect())
}

/// Send a notification to every recipient concurrently.
///
/// Succeeds when at least one recipient accepted it; returns the number of
/// successful deliveries.
pub async fn deliver(
    notifier: &dyn Notifier,
    notification: &Notification,
    recipients: &[String],
) -> Result<usize, MonitorError> {
    if recipients.is_empty() {
        return Err(MonitorError::notify(
            &notification.identity,
            "no recipients configured",
        ));
    }

    let tasks = recipients.iter().map(|recipient| async move {
        match notifier.send(notification, recipient).await {
            Ok(()) => {
                tracing::info!(
                    "Notification sent via {} to {}: {}",
                    notifier.notifier_name(),
                    recipient,
                    notification.subject
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "Failed to send notification via {} to {}: {}",
                    notifier.notifier_name(),
                    recipient,
                    e
                );
                Err(e)
            }
        }
    });

    let results = futures::future::join_all(tasks).await;
    let success_count = results.iter().filter(|r| r.is_ok()).count();

    if success_count == 0 {
        return Err(MonitorError::notify(
            &notification.identity,
            "all recipients failed",
        ));
    }

    Ok(success_count)
}
