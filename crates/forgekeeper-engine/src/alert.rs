//! Operator alerting boundary.
//!
//! The engine raises alerts through [`AlertSink`]; wiring them to mail,
//! chat, or paging lives behind the trait. The default sink writes
//! structured log events, which is enough for a single-host deployment
//! that ships logs somewhere durable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// How urgently an operator should look at this
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    /// Reserved for loss-of-guarantee conditions: policy violations,
    /// no recoverable copy, failed recovery
    Critical,
}

/// One alert raised by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,

    /// Short machine-greppable title (e.g. "policy-violation")
    pub title: String,

    /// Evidence for the operator
    pub detail: String,

    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Build an alert stamped with the current time
    #[must_use]
    pub fn new(severity: AlertSeverity, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            detail: detail.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Delivery boundary for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert. Delivery failures are the sink's problem to
    /// log; the engine never blocks on alerting.
    async fn raise(&self, alert: Alert);
}

/// Sink that emits alerts as structured log events.
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Info => {
                info!(title = %alert.title, detail = %alert.detail, "alert");
            }
            AlertSeverity::Warning => {
                warn!(title = %alert.title, detail = %alert.detail, "alert");
            }
            AlertSeverity::Critical => {
                error!(title = %alert.title, detail = %alert.detail, "alert");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_highest() {
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
    }
}
