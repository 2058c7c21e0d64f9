use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait, Set,
};
use std::time::Duration;
use tracing::info;

use crate::db::{StoreError, with_deadline};
use crate::entities::{permissions, prelude::*, users_permissions};
use crate::models::Permissions as PermissionSet;

pub struct PermissionRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl PermissionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// All capability codes granted to `user_id`. A user without grants gets
    /// an empty set, not an error.
    pub async fn get_all_for_user(&self, user_id: i64) -> Result<PermissionSet, StoreError> {
        let rows = with_deadline(
            self.timeout,
            Permissions::find()
                .join(
                    JoinType::InnerJoin,
                    permissions::Relation::UsersPermissions.def(),
                )
                .filter(users_permissions::Column::UserId.eq(user_id))
                .all(&self.conn),
        )
        .await?;

        Ok(rows.into_iter().map(|p| p.code).collect())
    }

    /// Grants the listed codes. Unknown codes and existing grants are
    /// skipped. Returns the number of new grants.
    pub async fn add_for_user(&self, user_id: i64, codes: &[String]) -> Result<u64, StoreError> {
        if codes.is_empty() {
            return Ok(0);
        }

        let known = with_deadline(
            self.timeout,
            Permissions::find()
                .filter(permissions::Column::Code.is_in(codes.iter().cloned()))
                .all(&self.conn),
        )
        .await?;

        if known.is_empty() {
            return Ok(0);
        }

        let grants = known.iter().map(|p| users_permissions::ActiveModel {
            user_id: Set(user_id),
            permission_id: Set(p.id),
        });

        let inserted = with_deadline(
            self.timeout,
            UsersPermissions::insert_many(grants)
                .on_conflict(
                    OnConflict::columns([
                        users_permissions::Column::UserId,
                        users_permissions::Column::PermissionId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.conn),
        )
        .await?;

        info!(user_id, granted = inserted, "Granted permissions");
        Ok(inserted)
    }
}
