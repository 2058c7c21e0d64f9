use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Capability codes known to the movie routes.
const SEED_CODES: &[&str] = &["movies:read", "movies:write"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Permissions::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UsersPermissions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UsersPermissions::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(UsersPermissions::PermissionId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(UsersPermissions::UserId)
                            .col(UsersPermissions::PermissionId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_permissions_user_id")
                            .from(UsersPermissions::Table, UsersPermissions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_permissions_permission_id")
                            .from(UsersPermissions::Table, UsersPermissions::PermissionId)
                            .to(Permissions::Table, Permissions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        let mut insert = Query::insert()
            .into_table(Permissions::Table)
            .columns([Permissions::Code])
            .to_owned();
        for code in SEED_CODES {
            insert.values_panic([(*code).into()]);
        }
        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsersPermissions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Permissions {
    Table,
    Id,
    Code,
}

#[derive(Iden)]
enum UsersPermissions {
    Table,
    UserId,
    PermissionId,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
