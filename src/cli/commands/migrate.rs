//! Migrate command handler

use crate::config::Config;
use crate::db::Store;

/// Opening the store applies any pending migrations.
pub async fn cmd_migrate(config: &Config) -> anyhow::Result<()> {
    let store = Store::from_config(config).await?;
    store.ping().await?;
    println!("Migrations applied to {}", config.general.database_path);
    Ok(())
}
