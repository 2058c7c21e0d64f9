use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod error;
pub mod migrator;
pub mod repositories;

pub use error::StoreError;
pub use repositories::movie::MovieRepository;
pub use repositories::permission::PermissionRepository;
pub use repositories::token::TokenRepository;
pub use repositories::user::UserRepository;

/// Handle to the backing database, cloned into every repository.
///
/// Holds no request state; the pool inside is shared.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    query_timeout: Duration,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
        query_timeout: Duration,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self {
            conn,
            query_timeout,
        })
    }

    pub async fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
            config.general.query_timeout(),
        )
        .await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let backend = self.conn.get_database_backend();
        with_deadline(
            self.query_timeout,
            self.conn
                .query_one(Statement::from_string(backend, "SELECT 1".to_string())),
        )
        .await?;
        Ok(())
    }

    #[must_use]
    pub fn movies(&self) -> MovieRepository {
        MovieRepository::new(self.conn.clone(), self.query_timeout)
    }

    #[must_use]
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.conn.clone(), self.query_timeout)
    }

    #[must_use]
    pub fn tokens(&self) -> TokenRepository {
        TokenRepository::new(self.conn.clone(), self.query_timeout)
    }

    #[must_use]
    pub fn permissions(&self) -> PermissionRepository {
        PermissionRepository::new(self.conn.clone(), self.query_timeout)
    }
}

/// Runs one storage call under `limit`. On expiry the future is dropped and
/// the call reported as [`StoreError::Timeout`].
pub async fn with_deadline<T, E, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, E>>,
    StoreError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Fixed-width UTC timestamp so that stored strings sort chronologically.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
