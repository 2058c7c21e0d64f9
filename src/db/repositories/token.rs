use chrono::TimeDelta;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::time::Duration;
use tracing::debug;

use crate::db::{StoreError, format_timestamp, with_deadline};
use crate::entities::{prelude::*, tokens};
use crate::models::{Scope, Token};

/// Token persistence. Rows are keyed by the plaintext's digest; the
/// plaintext itself is never written.
pub struct TokenRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// Generates, stores and returns a token. The returned plaintext is the
    /// only copy that will ever exist.
    pub async fn new_token(
        &self,
        user_id: i64,
        ttl: TimeDelta,
        scope: Scope,
    ) -> Result<Token, StoreError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        Ok(token)
    }

    pub async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        let active = tokens::ActiveModel {
            hash: Set(token.hash.clone()),
            user_id: Set(token.user_id),
            expiry: Set(format_timestamp(token.expiry)),
            scope: Set(token.scope.as_str().to_string()),
        };

        with_deadline(self.timeout, Tokens::insert(active).exec(&self.conn)).await?;
        debug!(user_id = token.user_id, scope = %token.scope, "Issued token");
        Ok(())
    }

    /// Removes every token of `scope` owned by `user_id`. Returns how many
    /// rows went away.
    pub async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError> {
        let result = with_deadline(
            self.timeout,
            Tokens::delete_many()
                .filter(tokens::Column::Scope.eq(scope.as_str()))
                .filter(tokens::Column::UserId.eq(user_id))
                .exec(&self.conn),
        )
        .await?;

        debug!(user_id, scope = %scope, purged = result.rows_affected, "Purged tokens");
        Ok(result.rows_affected)
    }
}
