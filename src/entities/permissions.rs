use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Capability code, e.g. `movies:read`
    #[sea_orm(unique)]
    pub code: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::users_permissions::Entity")]
    UsersPermissions,
}

impl Related<super::users_permissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsersPermissions.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        super::users_permissions::Relation::Users.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::users_permissions::Relation::Permissions.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
