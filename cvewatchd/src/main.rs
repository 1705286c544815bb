use clap::Parser;
use cvewatch_common::{config, db::Database};
use cvewatch_module_notifier::server::{notifier, NotifierConfig};

#[derive(clap::Parser, Debug)]
#[command(
    author,
    version = env!("CARGO_PKG_VERSION"),
    about = "cvewatchd",
    long_about = None
)]
pub struct Cvewatchd {
    #[command(flatten)]
    pub database: config::Database,

    #[command(flatten)]
    pub notifier: NotifierConfig,
}

impl Cvewatchd {
    async fn run(self) -> anyhow::Result<()> {
        let db = Database::with_external_config(&self.database).await?;

        notifier(db, self.notifier).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    Cvewatchd::parse().run().await
}
