//! Notification dispatch — the routine fired by the recurring trigger.
//!
//! DESIGN
//! ======
//! Deciding who gets notified and what they receive belongs to the
//! notification service. This task only wakes it up: when a dispatch URL is
//! configured it posts a small trigger payload there; otherwise it logs that
//! dispatch is disabled and returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::NotificationConfig;
use crate::identity::IdentityContext;
use crate::scheduler::{ScheduledTask, TaskError};

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("dispatch request failed: {0}")]
    Request(String),

    #[error("dispatch endpoint returned status {status}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct TriggerPayload<'a> {
    triggered_at: String,
    principal: &'a str,
}

enum Target {
    Webhook { http: reqwest::Client, url: String },
    Disabled,
}

/// Scheduled task that triggers the notification service.
pub struct NotificationDispatchTask {
    target: Target,
    identity: Arc<IdentityContext>,
}

impl NotificationDispatchTask {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &NotificationConfig, identity: Arc<IdentityContext>) -> Result<Self, DispatchError> {
        let target = match &config.dispatch_url {
            Some(url) => {
                let http = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.dispatch_timeout_secs))
                    .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                    .build()
                    .map_err(|e| DispatchError::HttpClientBuild(e.to_string()))?;
                Target::Webhook { http, url: url.clone() }
            }
            None => Target::Disabled,
        };
        Ok(Self { target, identity })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self.target, Target::Webhook { .. })
    }

    /// Fire one dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint answers non-2xx.
    pub async fn dispatch(&self) -> Result<(), DispatchError> {
        let Target::Webhook { http, url } = &self.target else {
            debug!("notification dispatch disabled; no endpoint configured");
            return Ok(());
        };

        let payload = TriggerPayload {
            triggered_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            principal: self.identity.principal(),
        };
        let response = http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status: status.as_u16(), body });
        }

        debug!(%url, status = status.as_u16(), "notification dispatch triggered");
        Ok(())
    }
}

#[async_trait]
impl ScheduledTask for NotificationDispatchTask {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.dispatch().await.map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "notifications_test.rs"]
mod tests;
