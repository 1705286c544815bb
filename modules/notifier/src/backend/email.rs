use super::{render_changes, render_report, Backend, Delivery, Error, TEST_MESSAGE};
use crate::{changes::ChangePayload, reports::ReportSummary};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;

fn default_smtp_port() -> u16 {
    587
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

pub struct EmailBackend {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailBackend {
    pub fn new(name: &str, config: EmailConfig) -> Result<Self, Error> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|err| Error::Transport {
                name: name.into(),
                message: err.to_string(),
            })?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self { config, mailer })
    }

    async fn send(&self, subject: &str, body: String) -> Delivery {
        let message = Message::builder()
            .from(match self.config.from.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => return Delivery::failure(format!("from address: {err}")),
            })
            .to(match self.config.to.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => return Delivery::failure(format!("to address: {err}")),
            })
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body);

        let message = match message {
            Ok(message) => message,
            Err(err) => return Delivery::failure(format!("building message: {err}")),
        };

        match self.mailer.send(message).await {
            Ok(_) => Delivery::ok("message accepted"),
            Err(err) => Delivery::failure(err.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Backend for EmailBackend {
    async fn test(&self) -> Delivery {
        self.send("cvewatch test", TEST_MESSAGE.into()).await
    }

    async fn notify_changes(&self, changes: &ChangePayload) -> Delivery {
        let subject = format!("{} CVE(s) changed", changes.len());
        self.send(&subject, render_changes(changes)).await
    }

    async fn send_report(&self, summary: &ReportSummary) -> Delivery {
        self.send("Your daily CVE report", render_report(summary))
            .await
    }
}
