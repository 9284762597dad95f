//! Notification sinks
//!
//! ## Responsibilities
//!
//! - Fan-out targets for accepted alerts: mail relay and local desktop
//! - Best-effort delivery, no retries; failures are the caller's to log
//!
//! The actual transports (SMTP, notification daemon) live outside the
//! pipeline; these adapters hand alerts over to them.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// One notification target
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &str;

    async fn notify(
        &self,
        subject: &str,
        message: &str,
        attachment: Option<&Path>,
    ) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct MailPayload<'a> {
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<String>,
}

/// Hands alerts to an external mail relay over HTTP
pub struct MailGatewayNotifier {
    client: reqwest::Client,
    gateway_url: String,
}

impl MailGatewayNotifier {
    pub fn new(gateway_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Startup(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            gateway_url: gateway_url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for MailGatewayNotifier {
    fn name(&self) -> &str {
        "mail-gateway"
    }

    async fn notify(
        &self,
        subject: &str,
        message: &str,
        attachment: Option<&Path>,
    ) -> Result<()> {
        // Only reference attachments that actually exist on disk
        let attachment = attachment
            .filter(|p| p.exists())
            .map(|p| p.display().to_string());

        let payload = MailPayload {
            subject,
            body: message,
            attachment,
        };
        let response = self
            .client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("mail relay unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "mail relay returned {}",
                response.status()
            )));
        }
        tracing::debug!(subject = %subject, "Mail notification relayed");
        Ok(())
    }
}

/// Local desktop notification via `notify-send`
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("camwatch")
    }
}

#[async_trait]
impl NotificationSink for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn notify(
        &self,
        subject: &str,
        message: &str,
        _attachment: Option<&Path>,
    ) -> Result<()> {
        let status = Command::new("notify-send")
            .arg("--app-name")
            .arg(&self.app_name)
            .arg(subject)
            .arg(message)
            .status()
            .await
            .map_err(|e| Error::Notification(format!("notify-send failed to start: {e}")))?;

        if !status.success() {
            return Err(Error::Notification(format!(
                "notify-send exited with {status}"
            )));
        }
        tracing::debug!(subject = %subject, "Desktop notification sent");
        Ok(())
    }
}
