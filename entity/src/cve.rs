use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cve")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cve_id: String,
    pub summary: String,

    pub cvss2: Option<f64>,
    pub cvss3: Option<f64>,

    /// vendor names and `vendor$PRODUCT$product` composites, as a JSON array
    pub vendors: Json,
    pub cwes: Json,

    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::change::Entity")]
    Change,
    #[sea_orm(has_many = "super::event::Entity")]
    Event,
}

impl Related<super::change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Change.def()
    }
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
