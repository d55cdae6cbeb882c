// Email notifier - Using lettre

use crate::error::MonitorError;
use crate::monitor::alerts::{Notification, Notifier};
use crate::monitor::config::SmtpSettings;
use async_trait::async_trait;
use lettre::message::{Mailbox, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

/// Sends notifications over SMTP
pub struct SmtpNotifier {
    settings: SmtpSettings,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Result<Self, MonitorError> {
        settings
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| {
                MonitorError::config(format!(
                    "invalid SMTP from address '{}': {}",
                    settings.from_address, e
                ))
            })?;

        Ok(Self { settings })
    }

    /// Build a plain-text message for one recipient
    fn build_message(&self, notification: &Notification, recipient: &str) -> Result<Message, MonitorError> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| MonitorError::notify(recipient, format!("invalid address: {}", e)))?;
        let from = self
            .settings
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| MonitorError::config(format!("invalid SMTP from address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(notification.subject.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| MonitorError::notify(recipient, format!("failed to build message: {}", e)))
    }

    /// Get SMTP transport
    fn get_transport(&self) -> Result<SmtpTransport, MonitorError> {
        let builder = if self.settings.starttls {
            SmtpTransport::starttls_relay(&self.settings.host)
        } else {
            SmtpTransport::relay(&self.settings.host)
        }
        .map_err(|e| MonitorError::config(format!("SMTP relay {}: {}", self.settings.host, e)))?;

        let mut builder = builder
            .port(self.settings.port)
            .timeout(Some(Duration::from_secs(self.settings.timeout_seconds)));

        if let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Check that the SMTP server accepts connections
    pub async fn test_connection(&self) -> Result<bool, MonitorError> {
        let transport = self.get_transport()?;
        let host = self.settings.host.clone();

        tokio::task::spawn_blocking(move || transport.test_connection())
            .await
            .map_err(|e| MonitorError::notify(&host, format!("SMTP task failed: {}", e)))?
            .map_err(|e| MonitorError::notify(&host, format!("SMTP connection test failed: {}", e)))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification, recipient: &str) -> Result<(), MonitorError> {
        let message = self.build_message(notification, recipient)?;
        let transport = self.get_transport()?;

        // Send email (blocking operation, run in blocking task)
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MonitorError::notify(recipient, format!("SMTP task failed: {}", e)))?
            .map_err(|e| MonitorError::notify(recipient, format!("failed to send email: {}", e)))?;

        Ok(())
    }

    fn notifier_name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::CertificateStatus;

    fn create_test_settings() -> SmtpSettings {
        SmtpSettings {
            enabled: true,
            host: "smtp.example.com".to_string(),
            port: 587,
            from_address: "certmon@example.com".to_string(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            starttls: true,
            timeout_seconds: 5,
        }
    }

    fn notification() -> Notification {
        Notification {
            identity: "secret-default.web".to_string(),
            status: CertificateStatus::Expired,
            subject: "Certificate Expired: default.web".to_string(),
            body: "The certificate default.web has expired on 2025-01-01T00:00:00Z.".to_string(),
        }
    }

    #[test]
    fn test_invalid_from_address_rejected() {
        let mut settings = create_test_settings();
        settings.from_address = "not an address".to_string();
        assert!(matches!(
            SmtpNotifier::new(settings),
            Err(MonitorError::Config { .. })
        ));
    }

    #[test]
    fn test_build_message() {
        let notifier = SmtpNotifier::new(create_test_settings()).unwrap();
        let message = notifier.build_message(&notification(), "ops@example.com").unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Certificate Expired: default.web"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("has expired on"));
    }

    #[test]
    fn test_invalid_recipient_is_notify_error() {
        let notifier = SmtpNotifier::new(create_test_settings()).unwrap();
        let err = notifier.build_message(&notification(), "nobody").unwrap_err();
        assert!(matches!(err, MonitorError::Notify { .. }));
    }

    #[test]
    fn test_notifier_name() {
        let notifier = SmtpNotifier::new(create_test_settings()).unwrap();
        assert_eq!(notifier.notifier_name(), "email");
    }
}
