use crate::{
    dispatch::DispatchJob,
    subscription::{Error as SubscriptionError, SubscriptionService, PRODUCT_SEPARATOR},
};
use cvewatch_common::db::Database;
use cvewatch_entity::{change, cve, event, event::EventKind, integration, report};
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CveSummary {
    pub summary: String,
    pub score: Option<f64>,
    pub events: Vec<EventKind>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VendorSummary {
    pub name: String,
    pub changes: BTreeMap<String, CveSummary>,
    pub max: f64,
}

/// Per-vendor summary of a daily report, keyed by the normalized vendor
/// name (product separator collapsed to `_`).
pub type ReportSummary = BTreeMap<String, VendorSummary>;

#[derive(Clone, Debug)]
pub struct ReportService {
    db: Database,
    subscriptions: SubscriptionService,
}

impl ReportService {
    pub fn new(db: Database) -> Self {
        let subscriptions = SubscriptionService::new(db.clone());
        Self { db, subscriptions }
    }

    /// Collect today's reports and emit one dispatch job per report-enabled
    /// integration of each report's user.
    ///
    /// Only reports dated the current UTC day are selected, so a run at
    /// exactly midnight sees the new, still-empty day. The scan must run
    /// before the day rolls over to deliver what that day accumulated.
    pub async fn handle_reports(&self) -> Result<Vec<DispatchJob>, Error> {
        let today = OffsetDateTime::now_utc().date();

        let reports = report::Entity::find()
            .filter(report::Column::Day.eq(today))
            .all(&*self.db)
            .await?;

        log::info!("Checking {} daily report(s) to send...", reports.len());

        let mut jobs = Vec::new();

        for report in reports {
            let integrations = integration::Entity::find()
                .filter(integration::Column::UserId.eq(report.user_id))
                .filter(integration::Column::Report.eq(true))
                .all(&*self.db)
                .await?;

            if integrations.is_empty() {
                log::info!(
                    "report {} has no report-enabled integrations, skipping",
                    report.public_link
                );
                continue;
            }

            for integration in integrations {
                jobs.push(DispatchJob::NotifyReport {
                    integration_id: integration.id,
                    report_id: report.id,
                });
            }
        }

        Ok(jobs)
    }

    /// Sort the report's changes by subscribed vendors and products and
    /// track the maximum CVSSv3 score per vendor group.
    pub async fn summary(&self, report: &report::Model) -> Result<ReportSummary, Error> {
        let subscribed = self.subscriptions.subscribed_names(report.user_id).await?;

        let changes = report.find_related(change::Entity).all(&*self.db).await?;

        let mut summary = ReportSummary::new();

        for change in changes {
            let Some(cve) = cve::Entity::find_by_id(change.cve_id).one(&*self.db).await? else {
                continue;
            };

            let events = event::Entity::find()
                .filter(event::Column::ChangeId.eq(change.id))
                .all(&*self.db)
                .await?;

            let identifiers: Vec<String> = serde_json::from_value(cve.vendors.clone())?;

            for identifier in identifiers
                .iter()
                .filter(|identifier| subscribed.contains(*identifier))
            {
                let key = identifier.replace(PRODUCT_SEPARATOR, "_");

                let entry = summary.entry(key.clone()).or_insert_with(|| VendorSummary {
                    name: humanize(&key),
                    changes: BTreeMap::new(),
                    max: 0.0,
                });

                entry.changes.insert(
                    cve.cve_id.clone(),
                    CveSummary {
                        summary: cve.summary.clone(),
                        score: cve.cvss3,
                        events: events.iter().map(|event| event.kind).collect(),
                    },
                );

                if let Some(score) = cve.cvss3 {
                    if score > entry.max {
                        entry.max = score;
                    }
                }
            }
        }

        Ok(summary)
    }
}

/// "acme_corp" becomes "Acme Corp".
fn humanize(value: &str) -> String {
    value
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
