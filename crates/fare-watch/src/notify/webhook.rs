// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSON webhook delivery.

use super::{AlertMessage, Notifier};
use crate::error::{MonitorError, MonitorResult};
use async_trait::async_trait;
use std::time::Duration;

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let url = url.into();
        url::Url::parse(&url)
            .map_err(|e| MonitorError::Configuration(format!("invalid webhook URL {url:?}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &AlertMessage) -> MonitorResult<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| MonitorError::NotificationDelivery(format!("webhook request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MonitorError::NotificationDelivery(format!(
                "webhook returned HTTP {status}"
            )));
        }
        tracing::info!(url = %self.url, "webhook notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> AlertMessage {
        AlertMessage {
            recipient: "ops".into(),
            subject: "Flight Price Alert: GOT-BJS".into(),
            body: "The flight price for GOT-BJS has dropped below the threshold.".into(),
            prices: vec![],
        }
    }

    #[tokio::test]
    async fn test_posts_alert_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/fares"))
            .and(body_partial_json(serde_json::json!({
                "subject": "Flight Price Alert: GOT-BJS"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hooks/fares", server.uri()), Duration::from_secs(5))
                .unwrap();
        notifier.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = notifier.send(&message()).await.unwrap_err();
        assert!(matches!(err, MonitorError::NotificationDelivery(_)));
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(WebhookNotifier::new("not a url", Duration::from_secs(1)).is_err());
    }
}
