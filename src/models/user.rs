use serde::Serialize;

use super::Password;
use super::password::validate_password_plaintext;
use crate::validation::{self, Validator};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

/// An account that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: Password,
    pub activated: bool,
}

impl NewUser {
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.name.is_empty(), "name", "must be provided");
        v.check(
            self.name.len() <= 500,
            "name",
            "must not be more than 500 bytes long",
        );

        validate_email(v, &self.email);

        if let Some(plaintext) = self.password.plaintext() {
            validate_password_plaintext(v, plaintext);
        }
        v.check(
            !self.password.hash().is_empty(),
            "password",
            "missing password hash",
        );
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        validation::is_email(email),
        "email",
        "must be a valid email address",
    );
}

/// Emails compare case-insensitively; the store keeps them lower-cased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PasswordParams, Secret};

    const TEST_PARAMS: PasswordParams = PasswordParams {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };

    fn new_user(name: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: Password::set(Secret::new(password), &TEST_PARAMS).unwrap(),
            activated: false,
        }
    }

    #[test]
    fn test_valid_user() {
        let mut v = Validator::new();
        new_user("Alice", "alice@example.com", "pa55word1234").validate(&mut v);
        assert!(v.is_valid(), "{:?}", v.errors());
    }

    #[test]
    fn test_invalid_user_fields() {
        let mut v = Validator::new();
        new_user("", "not-an-email", "short").validate(&mut v);

        assert_eq!(v.errors()["name"], "must be provided");
        assert_eq!(v.errors()["email"], "must be a valid email address");
        assert_eq!(v.errors()["password"], "must be at least 8 bytes long");
    }

    #[test]
    fn test_serialized_user_hides_credential_and_version() {
        let user = User {
            id: 3,
            created_at: "2026-01-01T00:00:00.000000Z".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: Password::from_hash("$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string()),
            activated: false,
            version: 4,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("version").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["activated"], false);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
