pub mod movie;
pub mod password;
pub mod permission;
pub mod secret;
pub mod token;
pub mod user;

pub use movie::{Movie, NewMovie, Runtime};
pub use password::{CredentialError, Password, PasswordParams};
pub use permission::Permissions;
pub use secret::Secret;
pub use token::{Scope, Token};
pub use user::{NewUser, User};
