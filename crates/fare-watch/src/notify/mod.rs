// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Alert delivery.

pub mod email;
pub mod webhook;

use crate::error::MonitorResult;
use crate::normalize::PriceObservation;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub use email::{EmailNotifier, SmtpSettings};
pub use webhook::WebhookNotifier;

/// A composed alert ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub prices: Vec<PriceObservation>,
}

/// Delivers alerts to the operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &AlertMessage) -> MonitorResult<()>;
}

/// Which delivery channel alerts go through.
#[derive(Debug, Clone)]
pub enum NotifierSettings {
    Email(SmtpSettings),
    Webhook { url: String },
}

impl NotifierSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            NotifierSettings::Email(_) => "email",
            NotifierSettings::Webhook { .. } => "webhook",
        }
    }

    /// Construct the notifier. Request timeout applies to the webhook only.
    pub fn build(&self, timeout: Duration) -> MonitorResult<Box<dyn Notifier>> {
        Ok(match self {
            NotifierSettings::Email(smtp) => Box::new(EmailNotifier::new(smtp)?),
            NotifierSettings::Webhook { url } => Box::new(WebhookNotifier::new(url.clone(), timeout)?),
        })
    }
}

/// Build the alert for a payload of below-threshold observations.
pub fn compose(
    recipient: &str,
    destination: &str,
    currency_marker: &str,
    payload: &[PriceObservation],
) -> AlertMessage {
    let mut body = format!(
        "The flight price for {destination} has dropped below the threshold.\nThe current prices are:\n"
    );
    for obs in payload {
        if let Some(amount) = obs.amount {
            body.push_str(&format!("  {}: {amount} {currency_marker}\n", obs.key));
        }
    }

    AlertMessage {
        recipient: recipient.to_string(),
        subject: format!("Flight Price Alert: {destination}"),
        body,
        prices: payload.to_vec(),
    }
}
