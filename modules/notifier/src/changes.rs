use crate::{
    filter::AlertFilters,
    subscription::{Error as SubscriptionError, SubscriptionService},
};
use cvewatch_common::db::Database;
use cvewatch_entity::{change, cve, event, event::EventKind, integration, report, report_change};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

/// Event details of one change, keyed by event kind.
pub type EventDetails = BTreeMap<EventKind, serde_json::Value>;

/// The payload of one notification: CVE identifier to fired events.
pub type ChangePayload = BTreeMap<String, EventDetails>;

/// Notifications accumulated over one batch, keyed by integration.
#[derive(Clone, Debug, Default)]
pub struct PendingNotifications(pub HashMap<Uuid, ChangePayload>);

impl PendingNotifications {
    /// Merge the change's events into the integration's payload for this
    /// CVE. A second qualifying change on the same CVE within the batch
    /// extends the event map instead of replacing it.
    fn add(&mut self, integration_id: Uuid, cve_id: &str, events: &[event::Model]) {
        let payload = self
            .0
            .entry(integration_id)
            .or_default()
            .entry(cve_id.to_string())
            .or_default();

        for event in events {
            payload.insert(event.kind, event.details.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for PendingNotifications {
    type Item = (Uuid, ChangePayload);
    type IntoIter = std::collections::hash_map::IntoIter<Uuid, ChangePayload>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Clone, Debug)]
pub struct ChangeService {
    db: Database,
    subscriptions: SubscriptionService,
}

impl ChangeService {
    pub fn new(db: Database) -> Self {
        let subscriptions = SubscriptionService::new(db.clone());
        Self { db, subscriptions }
    }

    /// Scan all unreviewed changes, append them to the subscribers' daily
    /// reports and accumulate notification payloads for matching
    /// integrations. Every processed change ends up `reviewed`, whatever the
    /// later delivery outcome; dispatch is the caller's concern.
    pub async fn handle_changes(&self) -> Result<PendingNotifications, Error> {
        let changes = change::Entity::find()
            .filter(change::Column::Reviewed.eq(false))
            .all(&*self.db)
            .await?;

        if changes.is_empty() {
            log::info!("No CVE changed, exit.");
            return Ok(PendingNotifications::default());
        }

        log::info!("Checking {} changed CVE(s)...", changes.len());

        let mut notifications = PendingNotifications::default();

        for change in changes {
            self.process_change(change, &mut notifications).await?;
        }

        Ok(notifications)
    }

    async fn process_change(
        &self,
        change: change::Model,
        notifications: &mut PendingNotifications,
    ) -> Result<(), Error> {
        let Some(cve) = cve::Entity::find_by_id(change.cve_id).one(&*self.db).await? else {
            log::warn!("change {} references a missing CVE, skipping", change.id);
            self.mark_reviewed(change).await?;
            return Ok(());
        };

        let events = event::Entity::find()
            .filter(event::Column::ChangeId.eq(change.id))
            .all(&*self.db)
            .await?;
        let kinds: Vec<EventKind> = events.iter().map(|event| event.kind).collect();

        let subscribers = self.subscriptions.subscribers_of(&cve).await?;
        if subscribers.is_empty() {
            log::info!("[{}] no users to alert", cve.cve_id);
            self.mark_reviewed(change).await?;
            return Ok(());
        }

        log::info!("[{}] {} subscribed users found", cve.cve_id, subscribers.len());

        for user_id in subscribers.keys() {
            let report = self.append_to_report(*user_id, &change).await?;
            log::info!(
                "[{}][{user_id}] change added to report {}",
                cve.cve_id,
                report.public_link
            );

            let integrations = integration::Entity::find()
                .filter(integration::Column::UserId.eq(*user_id))
                .filter(integration::Column::Enabled.eq(true))
                .all(&*self.db)
                .await?;

            for integration in integrations {
                let filters = match AlertFilters::from_value(&integration.alert_filters) {
                    Ok(filters) => filters,
                    Err(err) => {
                        log::warn!(
                            "invalid alert filters on integration '{}': {err}",
                            integration.name
                        );
                        continue;
                    }
                };

                if !filters.matches(cve.cvss3, &kinds) {
                    continue;
                }

                notifications.add(integration.id, &cve.cve_id, &events);
                log::info!(
                    "[{}][{user_id}] change added in integration '{}'",
                    cve.cve_id,
                    integration.name
                );
            }
        }

        self.mark_reviewed(change).await
    }

    /// Find or create the user's report for the change's calendar day and
    /// link the change to it. Committed immediately so partial progress
    /// survives a crash mid-batch.
    async fn append_to_report(
        &self,
        user_id: Uuid,
        change: &change::Model,
    ) -> Result<report::Model, Error> {
        let day = change.created_at.date();

        let existing = report::Entity::find()
            .filter(report::Column::UserId.eq(user_id))
            .filter(report::Column::Day.eq(day))
            .one(&*self.db)
            .await?;

        let report = match existing {
            Some(report) => report,
            None => {
                report::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    day: Set(day),
                    public_link: Set(public_link()),
                    seen: Set(false),
                    details: Set(json!({})),
                    created_at: Set(change.created_at),
                }
                .insert(&*self.db)
                .await?
            }
        };

        let linked = report_change::Entity::find_by_id((report.id, change.id))
            .one(&*self.db)
            .await?;
        if linked.is_none() {
            report_change::ActiveModel {
                report_id: Set(report.id),
                change_id: Set(change.id),
            }
            .insert(&*self.db)
            .await?;
        }

        Ok(report)
    }

    /// The durability boundary: once flipped, this change is never
    /// reconsidered, even if a later dispatch fails.
    async fn mark_reviewed(&self, change: change::Model) -> Result<(), Error> {
        let mut change: change::ActiveModel = change.into();
        change.reviewed = Set(true);
        change.update(&*self.db).await?;
        Ok(())
    }
}

/// Random sharing token for a report, 12 uppercase alphanumeric characters.
fn public_link() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{self, IntegrationSpec};
    use test_log::test;

    #[test(tokio::test)]
    async fn no_subscribers_reviews_without_notification() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let change = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &change, EventKind::NewCve).await?;

        let notifications = service.handle_changes().await?;
        assert!(notifications.is_empty());

        let change = change::Entity::find_by_id(change.id)
            .one(&*db)
            .await?
            .expect("change still present");
        assert!(change.reviewed);

        let reports = report::Entity::find().all(&*db).await?;
        assert!(reports.is_empty());

        Ok(())
    }

    #[test(tokio::test)]
    async fn matching_change_notifies_and_reports() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let user = fixtures::user(&db, "alice").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;
        let integration = fixtures::integration(
            &db,
            &user,
            IntegrationSpec {
                alert_filters: serde_json::json!({"cvss": 5.0, "event_types": ["new_cve"]}),
                ..Default::default()
            },
        )
        .await?;

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let change = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &change, EventKind::NewCve).await?;

        let notifications = service.handle_changes().await?;
        assert_eq!(notifications.len(), 1);

        let payload = &notifications.0[&integration.id];
        assert_eq!(payload.len(), 1);
        assert!(payload["CVE-2024-0001"].contains_key(&EventKind::NewCve));

        let change = change::Entity::find_by_id(change.id)
            .one(&*db)
            .await?
            .expect("change still present");
        assert!(change.reviewed);

        let reports = report::Entity::find().all(&*db).await?;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].user_id, user.id);

        Ok(())
    }

    #[test(tokio::test)]
    async fn report_created_even_when_filter_rejects() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let user = fixtures::user(&db, "alice").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;
        fixtures::integration(
            &db,
            &user,
            IntegrationSpec {
                alert_filters: serde_json::json!({"cvss": 8.0, "event_types": ["new_cve"]}),
                ..Default::default()
            },
        )
        .await?;

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let change = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &change, EventKind::NewCve).await?;

        let notifications = service.handle_changes().await?;
        assert!(notifications.is_empty());

        // report aggregation is independent of integration filters
        let reports = report::Entity::find().all(&*db).await?;
        assert_eq!(reports.len(), 1);

        Ok(())
    }

    #[test(tokio::test)]
    async fn disabled_integrations_do_not_fire() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let user = fixtures::user(&db, "alice").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;
        fixtures::integration(
            &db,
            &user,
            IntegrationSpec {
                enabled: false,
                ..Default::default()
            },
        )
        .await?;

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let change = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &change, EventKind::NewCve).await?;

        let notifications = service.handle_changes().await?;
        assert!(notifications.is_empty());

        Ok(())
    }

    #[test(tokio::test)]
    async fn same_day_changes_share_one_report() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let user = fixtures::user(&db, "alice").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let first = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &first, EventKind::NewCve).await?;

        service.handle_changes().await?;

        let second = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &second, EventKind::Summary).await?;

        service.handle_changes().await?;

        let reports = report::Entity::find().all(&*db).await?;
        assert_eq!(reports.len(), 1);

        let links = report_change::Entity::find().all(&*db).await?;
        assert_eq!(links.len(), 2);

        Ok(())
    }

    #[test(tokio::test)]
    async fn distinct_users_and_days_get_separate_reports() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let alice = fixtures::user(&db, "alice").await?;
        let bob = fixtures::user(&db, "bob").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &alice, &vendor).await?;
        fixtures::subscribe_vendor(&db, &bob, &vendor).await?;

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let change = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &change, EventKind::NewCve).await?;

        service.handle_changes().await?;

        let reports = report::Entity::find().all(&*db).await?;
        assert_eq!(reports.len(), 2);
        assert_ne!(reports[0].id, reports[1].id);
        assert_ne!(reports[0].public_link, reports[1].public_link);

        let mut user_ids: Vec<Uuid> = reports.iter().map(|report| report.user_id).collect();
        user_ids.sort();
        let mut expected = vec![alice.id, bob.id];
        expected.sort();
        assert_eq!(user_ids, expected);

        // a change from the previous day lands in a report of its own
        let earlier = fixtures::change_at(
            &db,
            &cve,
            time::OffsetDateTime::now_utc() - time::Duration::days(1),
        )
        .await?;
        fixtures::event(&db, &earlier, EventKind::Summary).await?;

        service.handle_changes().await?;

        let alices = report::Entity::find()
            .filter(report::Column::UserId.eq(alice.id))
            .all(&*db)
            .await?;
        assert_eq!(alices.len(), 2);
        assert_ne!(alices[0].day, alices[1].day);
        assert_ne!(alices[0].public_link, alices[1].public_link);

        Ok(())
    }

    #[test(tokio::test)]
    async fn payloads_merge_per_cve() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = ChangeService::new(db.clone());

        let user = fixtures::user(&db, "alice").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;
        let integration = fixtures::integration(
            &db,
            &user,
            IntegrationSpec {
                alert_filters: serde_json::json!({"event_types": ["new_cve", "summary"]}),
                ..Default::default()
            },
        )
        .await?;

        let cve = fixtures::cve(&db, "CVE-2024-0001", Some(7.5), &["acme"]).await?;
        let first = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &first, EventKind::NewCve).await?;
        let second = fixtures::change(&db, &cve).await?;
        fixtures::event(&db, &second, EventKind::Summary).await?;

        let notifications = service.handle_changes().await?;
        let payload = &notifications.0[&integration.id];

        let events = &payload["CVE-2024-0001"];
        assert!(events.contains_key(&EventKind::NewCve));
        assert!(events.contains_key(&EventKind::Summary));

        Ok(())
    }

    #[test]
    fn public_link_shape() {
        let link = public_link();
        assert_eq!(link.len(), 12);
        assert!(link
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
