use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub created_at: String,

    pub title: String,

    pub year: i32,

    /// Runtime in minutes
    pub runtime: i32,

    /// JSON array of genre names
    pub genres: String,

    /// Bumped by exactly one on every successful update
    #[sea_orm(default_value = 1)]
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
