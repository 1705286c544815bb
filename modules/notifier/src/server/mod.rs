use crate::{
    changes::ChangeService,
    dispatch::{DispatchJob, DispatchWorker, Dispatcher},
    reports::ReportService,
};
use cvewatch_common::db::Database;
use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, Time};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Debug, clap::Args)]
#[command(next_help_heading = "Notifier")]
pub struct NotifierConfig {
    /// seconds between change scans
    #[arg(long, env = "SCAN_INTERVAL", default_value_t = 900)]
    pub scan_interval: u64,

    /// UTC hour at which daily reports are sent; reports are selected by
    /// the current UTC day, so an hour near the end of the day covers what
    /// that day accumulated
    #[arg(long, env = "REPORT_HOUR", default_value_t = 0)]
    pub report_hour: u8,

    /// number of dispatch workers
    #[arg(long, env = "DISPATCH_WORKERS", default_value_t = 4)]
    pub workers: usize,
}

/// run the notifier loop
pub async fn notifier(db: Database, config: NotifierConfig) -> anyhow::Result<()> {
    Server { db, config }.run().await
}

/// Single node, single process notification processor.
struct Server {
    db: Database,
    config: NotifierConfig,
}

impl Server {
    async fn run(&self) -> anyhow::Result<()> {
        let (dispatcher, rx) = Dispatcher::new();
        let rx = Arc::new(Mutex::new(rx));

        let mut tasks = JoinSet::new();

        for _ in 0..self.config.workers.max(1) {
            let worker = DispatchWorker::new(self.db.clone());
            let rx = rx.clone();
            tasks.spawn(async move {
                worker.run(rx).await;
                Ok::<_, anyhow::Error>(())
            });
        }

        {
            let db = self.db.clone();
            let dispatcher = dispatcher.clone();
            let scan_interval = self.config.scan_interval;
            tasks.spawn(async move { change_scan(db, dispatcher, scan_interval).await });
        }

        {
            let db = self.db.clone();
            let report_hour = self.config.report_hour;
            tasks.spawn(async move { report_scan(db, dispatcher, report_hour).await });
        }

        while let Some(result) = tasks.join_next().await {
            result??;
        }

        Ok(())
    }
}

/// Scan loop for pending changes. Runs strictly sequentially, so two scans
/// never observe the same unreviewed change concurrently.
async fn change_scan(
    db: Database,
    dispatcher: Dispatcher,
    scan_interval: u64,
) -> anyhow::Result<()> {
    let service = ChangeService::new(db);

    let mut interval = tokio::time::interval(Duration::from_secs(scan_interval.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        log::debug!("scanning changes");

        match service.handle_changes().await {
            Ok(notifications) => {
                if !notifications.is_empty() {
                    log::info!(
                        "Sending notify task(s) for {} integration(s)...",
                        notifications.len()
                    );
                }
                for (integration_id, changes) in notifications {
                    dispatcher.enqueue(DispatchJob::NotifyChanges {
                        integration_id,
                        changes,
                    });
                }
            }
            Err(err) => log::error!("change scan failed: {err}"),
        }
    }
}

/// Daily loop sending report summaries at a fixed UTC hour.
async fn report_scan(db: Database, dispatcher: Dispatcher, report_hour: u8) -> anyhow::Result<()> {
    let service = ReportService::new(db);

    loop {
        tokio::time::sleep(until_next_run(OffsetDateTime::now_utc(), report_hour)).await;
        log::debug!("scanning reports");

        match service.handle_reports().await {
            Ok(jobs) => {
                for job in jobs {
                    dispatcher.enqueue(job);
                }
            }
            Err(err) => log::error!("report scan failed: {err}"),
        }
    }
}

/// Time to wait until the next occurrence of `hour` (UTC), always in the
/// future.
fn until_next_run(now: OffsetDateTime, hour: u8) -> Duration {
    let hour = hour.min(23);
    let target_time = Time::from_hms(hour, 0, 0).unwrap_or(Time::MIDNIGHT);

    let mut target = now.replace_time(target_time);
    if target <= now {
        target += time::Duration::days(1);
    }

    let wait = target - now;
    Duration::from_secs(wait.whole_seconds().max(1) as u64)
}

#[cfg(test)]
mod test {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn waits_until_the_next_occurrence() {
        let now = datetime!(2024-05-01 10:30:00 UTC);

        // later today
        let wait = until_next_run(now, 23);
        assert_eq!(wait, Duration::from_secs(12 * 3600 + 30 * 60));

        // already passed today, so tomorrow
        let wait = until_next_run(now, 0);
        assert_eq!(wait, Duration::from_secs(13 * 3600 + 30 * 60));
    }
}
