//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::TimeDelta;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{MAX_TOKEN_TTL_HOURS, SecurityConfig};
use crate::db::{Store, StoreError};
use crate::models::password::validate_password_plaintext;
use crate::models::token::validate_token_plaintext;
use crate::models::user::validate_email;
use crate::models::{NewUser, Password, PasswordParams, Permissions, Scope, Secret, Token, User};
use crate::services::auth_service::{AuthError, AuthService, Identity, Registration};
use crate::services::notifier::ActivationNotifier;
use crate::validation::Validator;

const DUPLICATE_EMAIL: &str = "a user with this email address already exists";
const INVALID_ACTIVATION_TOKEN: &str = "invalid or expired activation token";
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

pub struct SeaOrmAuthService {
    store: Store,
    params: PasswordParams,
    activation_ttl: TimeDelta,
    authentication_ttl: TimeDelta,
    default_permissions: Vec<String>,
    notifier: Arc<dyn ActivationNotifier>,
    /// Checked against on unknown emails so both login failures cost one hash.
    decoy: OnceCell<Password>,
}

impl SeaOrmAuthService {
    pub fn new(
        store: Store,
        security: &SecurityConfig,
        notifier: Arc<dyn ActivationNotifier>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            params: PasswordParams::from(security),
            activation_ttl: token_ttl(security.activation_token_ttl_hours)?,
            authentication_ttl: token_ttl(security.authentication_token_ttl_hours)?,
            default_permissions: security.default_permissions.clone(),
            notifier,
            decoy: OnceCell::new(),
        })
    }

    /// Argon2 is CPU bound; keep it off the async workers.
    async fn hash_password(&self, plaintext: Secret) -> Result<Password, AuthError> {
        let params = self.params;
        let password =
            tokio::task::spawn_blocking(move || Password::set(plaintext, &params)).await??;
        Ok(password)
    }

    async fn decoy_password(&self) -> Result<&Password, AuthError> {
        self.decoy
            .get_or_try_init(|| self.hash_password(Secret::new(DECOY_PASSWORD)))
            .await
    }

    async fn verify_password(
        &self,
        password: &Password,
        candidate: &Secret,
    ) -> Result<bool, AuthError> {
        let password = password.clone();
        let candidate = candidate.clone();
        let matched =
            tokio::task::spawn_blocking(move || password.matches(candidate.expose())).await??;
        Ok(matched)
    }
}

fn token_ttl(hours: i64) -> anyhow::Result<TimeDelta> {
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        anyhow::bail!("Token TTL of {hours} hours is outside 1..={MAX_TOKEN_TTL_HOURS}");
    }
    TimeDelta::try_hours(hours)
        .ok_or_else(|| anyhow::anyhow!("Token TTL of {hours} hours is out of range"))
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let Registration {
            name,
            email,
            password,
        } = registration;

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, &password);
        if !v.is_valid() {
            // Reject before paying for a hash; still report the other fields.
            let draft = NewUser {
                name,
                email,
                password: Password::from_hash(String::from("-")),
                activated: false,
            };
            draft.validate(&mut v);
            return Err(AuthError::Validation(v.into_errors()));
        }

        let new_user = NewUser {
            name,
            email,
            password: self.hash_password(password).await?,
            activated: false,
        };

        new_user.validate(&mut v);
        if !v.is_valid() {
            return Err(AuthError::Validation(v.into_errors()));
        }

        let user = match self.store.users().insert(&new_user).await {
            Ok(user) => user,
            Err(StoreError::DuplicateEmail) => {
                return Err(AuthError::field("email", DUPLICATE_EMAIL));
            }
            Err(e) => return Err(e.into()),
        };

        self.store
            .permissions()
            .add_for_user(user.id, &self.default_permissions)
            .await?;

        let token = self
            .store
            .tokens()
            .new_token(user.id, self.activation_ttl, Scope::Activation)
            .await?;

        if let Err(e) = self.notifier.activation_issued(&user, &token).await {
            warn!(user_id = user.id, error = %e, "Failed to deliver activation token");
        }

        Ok(user)
    }

    async fn activate(&self, token_plaintext: &str) -> Result<User, AuthError> {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token_plaintext);
        if !v.is_valid() {
            return Err(AuthError::Validation(v.into_errors()));
        }

        let user = match self
            .store
            .users()
            .get_for_token(Scope::Activation, token_plaintext)
            .await
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(AuthError::field("token", INVALID_ACTIVATION_TOKEN));
            }
            Err(e) => return Err(e.into()),
        };

        let user = self.store.users().activate(&user).await?;
        info!(user_id = user.id, "Account activated");
        Ok(user)
    }

    async fn create_authentication_token(
        &self,
        email: &str,
        password: &Secret,
    ) -> Result<Token, AuthError> {
        let mut v = Validator::new();
        validate_email(&mut v, email);
        validate_password_plaintext(&mut v, password);
        if !v.is_valid() {
            return Err(AuthError::Validation(v.into_errors()));
        }

        let user = match self.store.users().get_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                let decoy = self.decoy_password().await?;
                self.verify_password(decoy, password).await?;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.verify_password(&user.password, password).await? {
            debug!(user_id = user.id, "Password did not match");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .store
            .tokens()
            .new_token(user.id, self.authentication_ttl, Scope::Authentication)
            .await?;

        Ok(token)
    }

    async fn authenticate(&self, token_plaintext: &str) -> Result<User, AuthError> {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token_plaintext);
        if !v.is_valid() {
            return Err(AuthError::InvalidToken);
        }

        match self
            .store
            .users()
            .get_for_token(Scope::Authentication, token_plaintext)
            .await
        {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(AuthError::InvalidToken),
            Err(e) => Err(e.into()),
        }
    }

    async fn permissions_for(&self, user_id: i64) -> Result<Permissions, AuthError> {
        Ok(self.store.permissions().get_all_for_user(user_id).await?)
    }

    async fn authorize(&self, identity: &Identity, code: &str) -> Result<(), AuthError> {
        let Some(user) = identity.user() else {
            return Err(AuthError::AuthenticationRequired);
        };

        if !user.activated {
            return Err(AuthError::InactiveAccount);
        }

        let permissions = self.permissions_for(user.id).await?;
        if !permissions.include(code) {
            debug!(user_id = user.id, code, "Permission refused");
            return Err(AuthError::NotPermitted(code.to_string()));
        }

        Ok(())
    }

    async fn grant(&self, email: &str, codes: &[String]) -> Result<u64, AuthError> {
        let user = self.store.users().get_by_email(email).await?;
        Ok(self.store.permissions().add_for_user(user.id, codes).await?)
    }
}
