// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! SMTP delivery over STARTTLS.

use super::{AlertMessage, Notifier};
use crate::error::{MonitorError, MonitorResult};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP account used to send alerts.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub password: String,
}

pub struct EmailNotifier {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(settings: &SmtpSettings) -> MonitorResult<Self> {
        let from: Mailbox = settings.from.parse().map_err(|e| {
            MonitorError::Configuration(format!("invalid sender address {:?}: {e}", settings.from))
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| {
                MonitorError::Configuration(format!("invalid SMTP host {:?}: {e}", settings.host))
            })?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.from.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { from, transport })
    }

    fn build(&self, message: &AlertMessage) -> MonitorResult<Message> {
        let to: Mailbox = message.recipient.parse().map_err(|e| {
            MonitorError::NotificationDelivery(format!(
                "invalid recipient {:?}: {e}",
                message.recipient
            ))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| MonitorError::NotificationDelivery(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &AlertMessage) -> MonitorResult<()> {
        let email = self.build(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MonitorError::NotificationDelivery(format!("failed to send email: {e}")))?;
        tracing::info!(recipient = %message.recipient, "email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.gmail.com".into(),
            port: 587,
            from: "monitor@example.com".into(),
            password: "app-password".into(),
        }
    }

    #[tokio::test]
    async fn test_builds_plain_text_email() {
        let notifier = EmailNotifier::new(&settings()).unwrap();
        let msg = AlertMessage {
            recipient: "me@example.com".into(),
            subject: "Flight Price Alert: GOT-BJS".into(),
            body: "prices".into(),
            prices: vec![],
        };
        let email = notifier.build(&msg).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: Flight Price Alert: GOT-BJS"));
        assert!(raw.contains("To: me@example.com"));
    }

    #[tokio::test]
    async fn test_bad_sender_is_configuration_error() {
        let mut bad = settings();
        bad.from = "not an address".into();
        assert!(matches!(
            EmailNotifier::new(&bad),
            Err(MonitorError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_recipient_fails_delivery() {
        let notifier = EmailNotifier::new(&settings()).unwrap();
        let msg = AlertMessage {
            recipient: "nobody".into(),
            subject: "s".into(),
            body: "b".into(),
            prices: vec![],
        };
        assert!(matches!(
            notifier.build(&msg),
            Err(MonitorError::NotificationDelivery(_))
        ));
    }
}
