use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tokens")]
pub struct Model {
    /// Hex-encoded SHA-256 of the plaintext. The plaintext is never stored.
    #[sea_orm(primary_key, auto_increment = false)]
    pub hash: String,

    pub user_id: i64,

    /// RFC 3339 UTC timestamp with fixed microsecond precision, so that
    /// string comparison orders like time.
    pub expiry: String,

    pub scope: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
