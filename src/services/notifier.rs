//! Delivery of activation tokens to new account holders.

use async_trait::async_trait;
use tracing::info;

use crate::models::{Token, User};

/// Outbound seam for activation tokens. Implementations receive the only copy
/// of the plaintext and are responsible for getting it to the user.
#[async_trait]
pub trait ActivationNotifier: Send + Sync {
    async fn activation_issued(&self, user: &User, token: &Token) -> anyhow::Result<()>;
}

/// Records that a token went out without recording the token.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl ActivationNotifier for LogNotifier {
    async fn activation_issued(&self, user: &User, token: &Token) -> anyhow::Result<()> {
        info!(
            user_id = user.id,
            scope = %token.scope,
            expiry = %token.expiry,
            "Activation token issued"
        );
        Ok(())
    }
}
