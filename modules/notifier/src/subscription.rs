use cvewatch_common::db::Database;
use cvewatch_entity::{cve, product, product_subscription, vendor, vendor_subscription};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Separator embedded in a CVE identifier between vendor and product names.
pub const PRODUCT_SEPARATOR: &str = "$PRODUCT$";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// The vendor and product names through which one user matched a CVE.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subscriber {
    pub vendors: Vec<String>,
    pub products: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SubscriptionService {
    db: Database,
}

impl SubscriptionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve the users subscribed to any of the CVE's vendor/product
    /// identifiers. All identifiers are examined; matched names accumulate
    /// per user without duplicates. Identifiers unknown to the catalog are
    /// skipped.
    pub async fn subscribers_of(
        &self,
        cve: &cve::Model,
    ) -> Result<HashMap<Uuid, Subscriber>, Error> {
        let identifiers: Vec<String> = serde_json::from_value(cve.vendors.clone())?;

        let mut subscribers: HashMap<Uuid, Subscriber> = HashMap::new();

        for identifier in &identifiers {
            match identifier.split_once(PRODUCT_SEPARATOR) {
                Some((vendor_name, product_name)) => {
                    let Some(vendor) = self.vendor_by_name(vendor_name).await? else {
                        continue;
                    };
                    let Some(product) = product::Entity::find()
                        .filter(product::Column::VendorId.eq(vendor.id))
                        .filter(product::Column::Name.eq(product_name))
                        .one(&*self.db)
                        .await?
                    else {
                        continue;
                    };

                    let subscriptions = product_subscription::Entity::find()
                        .filter(product_subscription::Column::ProductId.eq(product.id))
                        .all(&*self.db)
                        .await?;

                    for subscription in subscriptions {
                        let entry = subscribers.entry(subscription.user_id).or_default();
                        if !entry.products.contains(&product.name) {
                            entry.products.push(product.name.clone());
                        }
                    }
                }
                None => {
                    let Some(vendor) = self.vendor_by_name(identifier).await? else {
                        continue;
                    };

                    let subscriptions = vendor_subscription::Entity::find()
                        .filter(vendor_subscription::Column::VendorId.eq(vendor.id))
                        .all(&*self.db)
                        .await?;

                    for subscription in subscriptions {
                        let entry = subscribers.entry(subscription.user_id).or_default();
                        if !entry.vendors.contains(&vendor.name) {
                            entry.vendors.push(vendor.name.clone());
                        }
                    }
                }
            }
        }

        Ok(subscribers)
    }

    /// The flat set of names a user subscribed to: vendor names plus
    /// `vendor$PRODUCT$product` composites. Used to intersect a CVE's
    /// identifiers when summarizing a report.
    pub async fn subscribed_names(&self, user_id: Uuid) -> Result<HashSet<String>, Error> {
        let mut names = HashSet::new();

        let vendors = vendor_subscription::Entity::find()
            .filter(vendor_subscription::Column::UserId.eq(user_id))
            .find_also_related(vendor::Entity)
            .all(&*self.db)
            .await?;

        for (_, vendor) in vendors {
            if let Some(vendor) = vendor {
                names.insert(vendor.name);
            }
        }

        let products = product_subscription::Entity::find()
            .filter(product_subscription::Column::UserId.eq(user_id))
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        for (_, product) in products {
            let Some(product) = product else {
                continue;
            };
            if let Some(vendor) = vendor::Entity::find_by_id(product.vendor_id)
                .one(&*self.db)
                .await?
            {
                names.insert(format!(
                    "{}{}{}",
                    vendor.name, PRODUCT_SEPARATOR, product.name
                ));
            }
        }

        Ok(names)
    }

    async fn vendor_by_name(&self, name: &str) -> Result<Option<vendor::Model>, Error> {
        Ok(vendor::Entity::find()
            .filter(vendor::Column::Name.eq(name))
            .one(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures;
    use test_log::test;

    #[test(tokio::test)]
    async fn resolves_all_identifiers() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = SubscriptionService::new(db.clone());

        let user = fixtures::user(&db, "alice").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        let product = fixtures::product(&db, &vendor, "anvil").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;
        fixtures::subscribe_product(&db, &user, &product).await?;

        let cve = fixtures::cve(
            &db,
            "CVE-2024-0001",
            Some(7.5),
            &["acme", "acme$PRODUCT$anvil"],
        )
        .await?;

        let subscribers = service.subscribers_of(&cve).await?;
        assert_eq!(subscribers.len(), 1);

        let subscriber = &subscribers[&user.id];
        assert_eq!(subscriber.vendors, vec!["acme"]);
        assert_eq!(subscriber.products, vec!["anvil"]);

        Ok(())
    }

    #[test(tokio::test)]
    async fn unknown_identifiers_are_skipped() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = SubscriptionService::new(db.clone());

        let user = fixtures::user(&db, "bob").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;

        let cve = fixtures::cve(
            &db,
            "CVE-2024-0002",
            None,
            &["unknown", "acme", "acme$PRODUCT$missing"],
        )
        .await?;

        let subscribers = service.subscribers_of(&cve).await?;
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[&user.id].vendors, vec!["acme"]);
        assert!(subscribers[&user.id].products.is_empty());

        Ok(())
    }

    #[test(tokio::test)]
    async fn subscribed_names_include_composites() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        let service = SubscriptionService::new(db.clone());

        let user = fixtures::user(&db, "carol").await?;
        let vendor = fixtures::vendor(&db, "acme").await?;
        let product = fixtures::product(&db, &vendor, "anvil").await?;
        fixtures::subscribe_vendor(&db, &user, &vendor).await?;
        fixtures::subscribe_product(&db, &user, &product).await?;

        let names = service.subscribed_names(user.id).await?;
        assert!(names.contains("acme"));
        assert!(names.contains("acme$PRODUCT$anvil"));
        assert_eq!(names.len(), 2);

        Ok(())
    }
}
