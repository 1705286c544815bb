use crate::{backend, changes::ChangePayload, reports::ReportService};
use cvewatch_common::db::Database;
use cvewatch_entity::{integration, report};
use sea_orm::EntityTrait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Report(#[from] crate::reports::Error),
}

/// One asynchronous delivery unit. Both variants re-fetch their referenced
/// rows at execution time and are safe to re-run; neither is retried.
#[derive(Clone, Debug)]
pub enum DispatchJob {
    NotifyChanges {
        integration_id: Uuid,
        changes: ChangePayload,
    },
    NotifyReport {
        integration_id: Uuid,
        report_id: Uuid,
    },
}

#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<DispatchJob>,
}

impl Dispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, job: DispatchJob) {
        if self.tx.send(job).is_err() {
            log::error!("dispatch queue is closed, dropping job");
        }
    }
}

/// Executes dispatch jobs. Deliveries are independent of each other; a
/// failing unit never affects its siblings.
#[derive(Clone, Debug)]
pub struct DispatchWorker {
    db: Database,
}

impl DispatchWorker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Consume jobs from a shared receiver until the queue closes.
    pub async fn run(&self, rx: Arc<Mutex<mpsc::UnboundedReceiver<DispatchJob>>>) {
        loop {
            let job = rx.lock().await.recv().await;
            let Some(job) = job else {
                return;
            };

            if let Err(err) = self.execute(job).await {
                log::error!("dispatch unit failed: {err}");
            }
        }
    }

    pub async fn execute(&self, job: DispatchJob) -> Result<(), Error> {
        match job {
            DispatchJob::NotifyChanges {
                integration_id,
                changes,
            } => self.notify_changes(integration_id, changes).await,
            DispatchJob::NotifyReport {
                integration_id,
                report_id,
            } => self.notify_report(integration_id, report_id).await,
        }
    }

    async fn notify_changes(
        &self,
        integration_id: Uuid,
        changes: ChangePayload,
    ) -> Result<(), Error> {
        // the user may have removed the integration before delivery
        let Some(integration) = integration::Entity::find_by_id(integration_id)
            .one(&*self.db)
            .await?
        else {
            log::warn!("Integration {integration_id} does not exist anymore, exit.");
            return Ok(());
        };

        let backend = match backend::for_integration(&integration) {
            Ok(backend) => backend,
            Err(err) => {
                log::warn!("[{}] {err}", integration.name);
                return Ok(());
            }
        };

        log::info!(
            "[{}] calling integration with {} changed CVE(s)...",
            integration.name,
            changes.len()
        );

        log_delivery(&integration.name, backend.notify_changes(&changes).await);
        Ok(())
    }

    async fn notify_report(&self, integration_id: Uuid, report_id: Uuid) -> Result<(), Error> {
        let Some(integration) = integration::Entity::find_by_id(integration_id)
            .one(&*self.db)
            .await?
        else {
            log::warn!("Integration {integration_id} does not exist anymore, exit.");
            return Ok(());
        };

        let Some(report) = report::Entity::find_by_id(report_id).one(&*self.db).await? else {
            log::warn!("Report {report_id} does not exist anymore, exit.");
            return Ok(());
        };

        let backend = match backend::for_integration(&integration) {
            Ok(backend) => backend,
            Err(err) => {
                log::warn!("[{}] {err}", integration.name);
                return Ok(());
            }
        };

        log::info!(
            "[{}] calling integration for report {}...",
            integration.name,
            report.public_link
        );

        let summary = ReportService::new(self.db.clone()).summary(&report).await?;
        log_delivery(&integration.name, backend.send_report(&summary).await);
        Ok(())
    }
}

fn log_delivery(name: &str, delivery: backend::Delivery) {
    if delivery.ok {
        log::info!("[{name}] integration successfully called");
    } else {
        log::error!("[{name}] error calling the integration:");
        log::error!("[{name}] {}", delivery.message);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test(tokio::test)]
    async fn deleted_integration_is_skipped() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let worker = DispatchWorker::new(db);

        worker
            .execute(DispatchJob::NotifyChanges {
                integration_id: Uuid::new_v4(),
                changes: ChangePayload::default(),
            })
            .await?;

        worker
            .execute(DispatchJob::NotifyReport {
                integration_id: Uuid::new_v4(),
                report_id: Uuid::new_v4(),
            })
            .await?;

        Ok(())
    }
}
