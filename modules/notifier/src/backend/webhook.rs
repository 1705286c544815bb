use super::{Backend, Delivery, Error, REQUEST_TIMEOUT, TEST_MESSAGE};
use crate::{changes::ChangePayload, reports::ReportSummary};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// POSTs the JSON payload to a user-supplied URL with optional custom
/// headers.
pub struct WebhookBackend {
    url: String,
    client: reqwest::Client,
}

impl WebhookBackend {
    pub fn new(name: &str, config: WebhookConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let key = key
                .parse::<HeaderName>()
                .map_err(|_| Error::Header(name.into()))?;
            let value = value
                .parse::<HeaderValue>()
                .map_err(|_| Error::Header(name.into()))?;
            headers.insert(key, value);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
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

    async fn post(&self, body: &serde_json::Value) -> Delivery {
        match self.client.post(&self.url).json(body).send().await {
            Ok(response) if response.status().is_success() => {
                Delivery::ok(format!("status {}", response.status()))
            }
            Ok(response) => Delivery::failure(format!("unexpected status {}", response.status())),
            Err(err) => Delivery::failure(err.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Backend for WebhookBackend {
    async fn test(&self) -> Delivery {
        self.post(&json!({"message": TEST_MESSAGE})).await
    }

    async fn notify_changes(&self, changes: &ChangePayload) -> Delivery {
        match serde_json::to_value(changes) {
            Ok(body) => self.post(&json!({"changes": body})).await,
            Err(err) => Delivery::failure(err.to_string()),
        }
    }

    async fn send_report(&self, summary: &ReportSummary) -> Delivery {
        match serde_json::to_value(summary) {
            Ok(body) => self.post(&json!({"report": body})).await,
            Err(err) => Delivery::failure(err.to_string()),
        }
    }
}
