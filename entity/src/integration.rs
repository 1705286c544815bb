use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "integration")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,

    /// unique per user
    pub name: String,
    pub kind: IntegrationKind,

    /// backend specific payload, decoded by the matching backend only
    pub configuration: Json,

    /// gates change notifications
    pub enabled: bool,
    /// gates daily report summaries
    pub report: bool,

    /// `{"cvss": <minimum score>, "event_types": [<kind>, ...]}`
    pub alert_filters: Json,

    pub created_at: TimeDateTimeWithTimeZone,
}

/// The closed registry of delivery channel types.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "webhook")]
    Webhook,
    #[sea_orm(string_value = "slack")]
    Slack,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
