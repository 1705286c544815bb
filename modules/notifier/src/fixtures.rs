//! Shared row builders for the service tests.

use cvewatch_common::db::Database;
use cvewatch_entity::{
    change, cve, event,
    event::EventKind,
    integration,
    integration::IntegrationKind,
    product, product_subscription, user, vendor, vendor_subscription,
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

pub async fn user(db: &Database, username: &str) -> Result<user::Model, anyhow::Error> {
    Ok(user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.into()),
        email: Set(format!("{username}@example.com")),
    }
    .insert(&**db)
    .await?)
}

pub async fn vendor(db: &Database, name: &str) -> Result<vendor::Model, anyhow::Error> {
    Ok(vendor::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
    }
    .insert(&**db)
    .await?)
}

pub async fn product(
    db: &Database,
    vendor: &vendor::Model,
    name: &str,
) -> Result<product::Model, anyhow::Error> {
    Ok(product::ActiveModel {
        id: Set(Uuid::new_v4()),
        vendor_id: Set(vendor.id),
        name: Set(name.into()),
    }
    .insert(&**db)
    .await?)
}

pub async fn subscribe_vendor(
    db: &Database,
    user: &user::Model,
    vendor: &vendor::Model,
) -> Result<(), anyhow::Error> {
    vendor_subscription::ActiveModel {
        user_id: Set(user.id),
        vendor_id: Set(vendor.id),
    }
    .insert(&**db)
    .await?;
    Ok(())
}

pub async fn subscribe_product(
    db: &Database,
    user: &user::Model,
    product: &product::Model,
) -> Result<(), anyhow::Error> {
    product_subscription::ActiveModel {
        user_id: Set(user.id),
        product_id: Set(product.id),
    }
    .insert(&**db)
    .await?;
    Ok(())
}

pub async fn cve(
    db: &Database,
    cve_id: &str,
    cvss3: Option<f64>,
    vendors: &[&str],
) -> Result<cve::Model, anyhow::Error> {
    Ok(cve::ActiveModel {
        id: Set(Uuid::new_v4()),
        cve_id: Set(cve_id.into()),
        summary: Set(format!("summary of {cve_id}")),
        cvss2: Set(None),
        cvss3: Set(cvss3),
        vendors: Set(json!(vendors)),
        cwes: Set(json!([])),
        updated_at: Set(OffsetDateTime::now_utc()),
    }
    .insert(&**db)
    .await?)
}

pub async fn change(db: &Database, cve: &cve::Model) -> Result<change::Model, anyhow::Error> {
    change_at(db, cve, OffsetDateTime::now_utc()).await
}

pub async fn change_at(
    db: &Database,
    cve: &cve::Model,
    created_at: OffsetDateTime,
) -> Result<change::Model, anyhow::Error> {
    Ok(change::ActiveModel {
        id: Set(Uuid::new_v4()),
        cve_id: Set(cve.id),
        reviewed: Set(false),
        created_at: Set(created_at),
    }
    .insert(&**db)
    .await?)
}

pub async fn event(
    db: &Database,
    change: &change::Model,
    kind: EventKind,
) -> Result<event::Model, anyhow::Error> {
    Ok(event::ActiveModel {
        id: Set(Uuid::new_v4()),
        cve_id: Set(change.cve_id),
        change_id: Set(change.id),
        kind: Set(kind),
        details: Set(json!({"kind": kind})),
    }
    .insert(&**db)
    .await?)
}

pub struct IntegrationSpec {
    pub name: String,
    pub kind: IntegrationKind,
    pub configuration: serde_json::Value,
    pub enabled: bool,
    pub report: bool,
    pub alert_filters: serde_json::Value,
}

impl Default for IntegrationSpec {
    fn default() -> Self {
        Self {
            name: "default".into(),
            kind: IntegrationKind::Webhook,
            configuration: json!({"url": "https://example.com/hook"}),
            enabled: true,
            report: false,
            alert_filters: json!({"cvss": 0.0, "event_types": ["new_cve"]}),
        }
    }
}

pub async fn integration(
    db: &Database,
    user: &user::Model,
    spec: IntegrationSpec,
) -> Result<integration::Model, anyhow::Error> {
    Ok(integration::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        name: Set(spec.name),
        kind: Set(spec.kind),
        configuration: Set(spec.configuration),
        enabled: Set(spec.enabled),
        report: Set(spec.report),
        alert_filters: Set(spec.alert_filters),
        created_at: Set(OffsetDateTime::now_utc()),
    }
    .insert(&**db)
    .await?)
}
