use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait, Set, TransactionTrait,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::db::{StoreError, format_timestamp, with_deadline};
use crate::entities::{prelude::*, tokens, users};
use crate::models::token::hash_plaintext;
use crate::models::user::normalize_email;
use crate::models::{NewUser, Password, Scope, User};

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            created_at: model.created_at,
            name: model.name,
            email: model.email,
            password: Password::from_hash(model.password_hash),
            activated: model.activated,
            version: model.version,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// Persists a new account. A taken email is reported as
    /// [`StoreError::DuplicateEmail`] so callers can attach it to the field.
    pub async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let active = users::ActiveModel {
            created_at: Set(format_timestamp(Utc::now())),
            name: Set(user.name.clone()),
            email: Set(normalize_email(&user.email)),
            password_hash: Set(user.password.hash().to_string()),
            activated: Set(user.activated),
            version: Set(1),
            ..Default::default()
        };

        let model = with_deadline(self.timeout, active.insert(&self.conn))
            .await
            .map_err(duplicate_email)?;

        info!(user_id = model.id, "Registered user");
        Ok(User::from(model))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let model = with_deadline(
            self.timeout,
            Users::find()
                .filter(users::Column::Email.eq(normalize_email(email)))
                .one(&self.conn),
        )
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(User::from(model))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let model = with_deadline(self.timeout, Users::find_by_id(id).one(&self.conn))
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(User::from(model))
    }

    /// Version-checked update of the mutable account fields.
    pub async fn update(&self, user: &User) -> Result<User, StoreError> {
        let email = normalize_email(&user.email);

        let result = with_deadline(
            self.timeout,
            Users::update_many()
                .col_expr(users::Column::Name, Expr::value(user.name.clone()))
                .col_expr(users::Column::Email, Expr::value(email.clone()))
                .col_expr(
                    users::Column::PasswordHash,
                    Expr::value(user.password.hash().to_string()),
                )
                .col_expr(users::Column::Activated, Expr::value(user.activated))
                .col_expr(users::Column::Version, Expr::col(users::Column::Version).add(1))
                .filter(users::Column::Id.eq(user.id))
                .filter(users::Column::Version.eq(user.version))
                .exec(&self.conn),
        )
        .await
        .map_err(duplicate_email)?;

        if result.rows_affected == 0 {
            return Err(StoreError::EditConflict);
        }

        Ok(User {
            email,
            version: user.version + 1,
            ..user.clone()
        })
    }

    /// Resolves a presented token plaintext to its owner. Only a row with the
    /// same hash, the same scope and an expiry in the future counts; every
    /// other outcome is [`StoreError::NotFound`].
    pub async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError> {
        let hash = hash_plaintext(plaintext);
        let now = format_timestamp(Utc::now());

        let model = with_deadline(
            self.timeout,
            Users::find()
                .join(JoinType::InnerJoin, users::Relation::Tokens.def())
                .filter(tokens::Column::Hash.eq(hash))
                .filter(tokens::Column::Scope.eq(scope.as_str()))
                .filter(tokens::Column::Expiry.gt(now))
                .one(&self.conn),
        )
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(User::from(model))
    }

    /// Marks the account activated and purges all of its activation tokens.
    ///
    /// Both statements run in one transaction: the version-checked flag flip
    /// first, then the purge. Nothing is applied unless both succeed, so a
    /// crash in between cannot leave an activated account with live
    /// activation tokens, or a purged family on an inactive account.
    pub async fn activate(&self, user: &User) -> Result<User, StoreError> {
        let work = async {
            let txn = self.conn.begin().await?;

            let flipped = Users::update_many()
                .col_expr(users::Column::Activated, Expr::value(true))
                .col_expr(users::Column::Version, Expr::col(users::Column::Version).add(1))
                .filter(users::Column::Id.eq(user.id))
                .filter(users::Column::Version.eq(user.version))
                .exec(&txn)
                .await?;

            if flipped.rows_affected == 0 {
                txn.rollback().await?;
                return Err(StoreError::EditConflict);
            }

            let purged = Tokens::delete_many()
                .filter(tokens::Column::UserId.eq(user.id))
                .filter(tokens::Column::Scope.eq(Scope::Activation.as_str()))
                .exec(&txn)
                .await?;

            txn.commit().await?;
            Ok::<u64, StoreError>(purged.rows_affected)
        };

        let purged = with_deadline(self.timeout, work).await?;
        debug!(user_id = user.id, purged, "Activated user");

        Ok(User {
            activated: true,
            version: user.version + 1,
            ..user.clone()
        })
    }
}

fn duplicate_email(err: StoreError) -> StoreError {
    if err.is_unique_violation() {
        StoreError::DuplicateEmail
    } else {
        err
    }
}
