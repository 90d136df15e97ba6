use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

use crate::notify::{AlertMessage, NotificationSink};
use crate::Notification;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// POSTs each notification as JSON to a fixed URL.
pub struct WebhookSink {
    url: url::Url,
    dwell: Duration,
}

impl WebhookSink {
    pub fn new(url: &str, dwell: Duration) -> Result<Self> {
        let url = url::Url::parse(url).with_context(|| format!("invalid webhook url {}", url))?;
        Ok(Self { url, dwell })
    }
}

impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        let message = AlertMessage::compose(notification, self.dwell);
        let payload = serde_json::to_string(&WebhookPayload {
            subject: &message.subject,
            body: &message.body,
            notification,
        })?;
        ureq::post(self.url.as_str())
            .timeout(REQUEST_TIMEOUT)
            .set("Content-Type", "application/json")
            .send_string(&payload)
            .with_context(|| format!("POST {}", self.url))?;
        Ok(())
    }
}
