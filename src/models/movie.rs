use chrono::{Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;

use crate::validation::{self, Validator};

/// Earliest accepted release year.
pub const MIN_YEAR: i32 = 1888;

/// Runtime in minutes. Travels over JSON as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl Runtime {
    #[must_use]
    pub const fn minutes(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuntimeVisitor;

        impl de::Visitor<'_> for RuntimeVisitor {
            type Value = Runtime;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string of the form \"<minutes> mins\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Runtime, E> {
                parse_runtime(value).ok_or_else(|| E::custom("invalid runtime format"))
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<Runtime, E> {
                Err(E::custom("invalid runtime format"))
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<Runtime, E> {
                Err(E::custom("invalid runtime format"))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<Runtime, E> {
                Err(E::custom("invalid runtime format"))
            }
        }

        deserializer.deserialize_any(RuntimeVisitor)
    }
}

fn parse_runtime(value: &str) -> Option<Runtime> {
    let (number, unit) = value.split_once(' ')?;
    if unit != "mins" {
        return None;
    }
    number.parse::<i32>().ok().map(Runtime)
}

/// A movie as stored. `version` is whatever the caller last observed; the
/// store uses it as the precondition for updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: String,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

impl Movie {
    pub fn validate(&self, v: &mut Validator) {
        validate_fields(v, &self.title, self.year, self.runtime, &self.genres);
    }
}

/// Fields for a movie that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewMovie {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl NewMovie {
    pub fn validate(&self, v: &mut Validator) {
        validate_fields(v, &self.title, self.year, self.runtime, &self.genres);
    }
}

fn validate_fields(v: &mut Validator, title: &str, year: i32, runtime: Runtime, genres: &[String]) {
    v.check(!title.is_empty(), "title", "must be provided");
    v.check(
        title.len() <= 500,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(year != 0, "year", "must be provided");
    v.check(year >= MIN_YEAR, "year", "must be greater than 1888");
    v.check(
        year <= Utc::now().year(),
        "year",
        "must not be in the future",
    );

    v.check(runtime.0 != 0, "runtime", "must be provided");
    v.check(runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        genres.len() <= 5,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        validation::unique(genres),
        "genres",
        "must not contain duplicate values",
    );
}
