use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "change")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cve_id: Uuid,

    /// false while the change awaits its notification decision, flipped to
    /// true exactly once by the change processor
    pub reviewed: bool,

    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cve::Entity",
        from = "Column::CveId",
        to = "super::cve::Column::Id"
    )]
    Cve,
    #[sea_orm(has_many = "super::event::Entity")]
    Event,
}

impl Related<super::cve::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cve.def()
    }
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::report::Entity> for Entity {
    fn to() -> RelationDef {
        super::report_change::Relation::Report.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::report_change::Relation::Change.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
