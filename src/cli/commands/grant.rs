//! Grant permissions command handler

use std::sync::Arc;

use crate::config::Config;
use crate::db::{Store, StoreError};
use crate::services::{AuthError, AuthService, LogNotifier, SeaOrmAuthService};

pub async fn cmd_grant(config: &Config, email: &str, codes: &[String]) -> anyhow::Result<()> {
    let store = Store::from_config(config).await?;
    let auth = SeaOrmAuthService::new(store.clone(), &config.security, Arc::new(LogNotifier))?;

    let granted = match auth.grant(email, codes).await {
        Ok(granted) => granted,
        Err(AuthError::Store(StoreError::NotFound)) => {
            println!("No user registered with email {email}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let user = store.users().get_by_email(email).await?;
    let held = auth.permissions_for(user.id).await?;

    println!("Granted {granted} new permission(s) to {email}");
    println!("Now holds: {}", held.iter().collect::<Vec<_>>().join(", "));
    Ok(())
}
