pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, Identity, Registration};
pub use auth_service_impl::SeaOrmAuthService;

pub mod notifier;
pub use notifier::{ActivationNotifier, LogNotifier};
