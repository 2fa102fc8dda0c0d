use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "goals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: i64,
    pub focus_id: i64,
    pub parent_id: Option<i64>,
    pub children: bool,
    pub active: bool,
    pub deadline: Option<DateTimeWithTimeZone>,
    pub title: String,
    pub description: Option<String>,
    #[sea_orm(column_name = "value")]
    pub value_text: Option<String>,
    pub criteria: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
