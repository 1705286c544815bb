use super::{render_changes, render_report, Backend, Delivery, Error, REQUEST_TIMEOUT, TEST_MESSAGE};
use crate::{changes::ChangePayload, reports::ReportSummary};
use serde::Deserialize;
use serde_json::json;

#[derive(Clone, Debug, Deserialize)]
pub struct SlackConfig {
    /// incoming webhook URL
    pub url: String,
}

pub struct SlackBackend {
    url: String,
    client: reqwest::Client,
}

impl SlackBackend {
    pub fn new(name: &str, config: SlackConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| Error::Transport {
                name: name.into(),
                message: err.to_string(),
            })?;

        Ok(Self {
            url: config.url,
            client,
        })
    }

    async fn post_text(&self, text: String) -> Delivery {
        match self
            .client
            .post(&self.url)
            .json(&json!({"text": text}))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                Delivery::ok(format!("status {}", response.status()))
            }
            Ok(response) => Delivery::failure(format!("unexpected status {}", response.status())),
            Err(err) => Delivery::failure(err.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Backend for SlackBackend {
    async fn test(&self) -> Delivery {
        self.post_text(TEST_MESSAGE.into()).await
    }

    async fn notify_changes(&self, changes: &ChangePayload) -> Delivery {
        let text = format!(
            "{} CVE(s) changed:\n{}",
            changes.len(),
            render_changes(changes)
        );
        self.post_text(text).await
    }

    async fn send_report(&self, summary: &ReportSummary) -> Delivery {
        let text = format!("Daily report:\n{}", render_report(summary));
        self.post_text(text).await
    }
}
