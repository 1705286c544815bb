//! Delivery channel implementations behind one capability contract.
//!
//! Backends never raise for expected failure modes: transport and
//! authentication errors are converted into a failed [`Delivery`] so the
//! caller can log and move on without aborting the batch.

mod email;
mod slack;
mod webhook;

pub use email::{EmailBackend, EmailConfig};
pub use slack::{SlackBackend, SlackConfig};
pub use webhook::{WebhookBackend, WebhookConfig};

use crate::{changes::ChangePayload, reports::ReportSummary};
use cvewatch_entity::integration::{self, IntegrationKind};
use sea_orm::ActiveEnum;
use std::fmt::Write;
use std::time::Duration;

pub const TEST_MESSAGE: &str = "This is a test from the cvewatch integration";

/// Bounded-time contract for outbound calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The outcome of one backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub ok: bool,
    pub message: String,
}

impl Delivery {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration for '{name}': {source}")]
    Configuration {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid header in configuration for '{0}'")]
    Header(String),
    #[error("failed to set up transport for '{name}': {message}")]
    Transport { name: String, message: String },
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Deliver the canned [`TEST_MESSAGE`].
    async fn test(&self) -> Delivery;

    /// Deliver an accumulated change notification.
    async fn notify_changes(&self, changes: &ChangePayload) -> Delivery;

    /// Deliver a daily report summary.
    async fn send_report(&self, summary: &ReportSummary) -> Delivery;
}

/// Construct the backend for an integration row. The registry is a closed
/// enumeration; unknown kinds cannot reach this point since the
/// discriminator is an active enum rejected at row decode time.
pub fn for_integration(integration: &integration::Model) -> Result<Box<dyn Backend>, Error> {
    Ok(match integration.kind {
        IntegrationKind::Email => Box::new(EmailBackend::new(
            &integration.name,
            decode(integration)?,
        )?),
        IntegrationKind::Webhook => Box::new(WebhookBackend::new(
            &integration.name,
            decode(integration)?,
        )?),
        IntegrationKind::Slack => Box::new(SlackBackend::new(
            &integration.name,
            decode(integration)?,
        )?),
    })
}

fn decode<T: serde::de::DeserializeOwned>(integration: &integration::Model) -> Result<T, Error> {
    serde_json::from_value(integration.configuration.clone()).map_err(|source| {
        Error::Configuration {
            name: integration.name.clone(),
            source,
        }
    })
}

/// Plain text rendering of a change payload, shared by the text-oriented
/// channels.
pub(crate) fn render_changes(changes: &ChangePayload) -> String {
    let mut out = String::new();
    for (cve_id, events) in changes {
        let kinds = events
            .keys()
            .map(|kind| kind.to_value())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "{cve_id}: {kinds}");
    }
    out
}

/// Plain text rendering of a report summary.
pub(crate) fn render_report(summary: &ReportSummary) -> String {
    let mut out = String::new();
    for group in summary.values() {
        let _ = writeln!(out, "{} (max score {})", group.name, group.max);
        for (cve_id, entry) in &group.changes {
            let score = entry
                .score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "n/a".into());
            let _ = writeln!(out, "  {cve_id} [{score}]: {}", entry.summary);
        }
    }
    out
}
