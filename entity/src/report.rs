use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,

    /// the calendar day this report aggregates, unique per user
    pub day: TimeDate,

    /// random sharing token, generated once at creation
    pub public_link: String,
    pub seen: bool,
    pub details: Json,

    pub created_at: TimeDateTimeWithTimeZone,
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

impl Related<super::change::Entity> for Entity {
    fn to() -> RelationDef {
        super::report_change::Relation::Change.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::report_change::Relation::Report.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
