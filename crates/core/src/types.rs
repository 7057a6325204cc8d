//! Domain types for the movie catalog and its principals

use crate::errors::{Error, Result};
use crate::validation::{unique, validate_email, Validator};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A movie's runtime in whole minutes.
///
/// Serialized as the string `"<minutes> mins"` and only accepted back in that
/// exact shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl Runtime {
    #[must_use]
    pub fn minutes(self) -> i32 {
        self.0
    }
}

impl From<i32> for Runtime {
    fn from(minutes: i32) -> Self {
        Runtime(minutes)
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value
            .strip_suffix(" mins")
            .and_then(|minutes| minutes.parse::<i32>().ok())
            .map(Runtime)
            .ok_or_else(|| serde::de::Error::custom("invalid runtime format"))
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    pub id: i64,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

/// Check every movie field, collecting all failures.
pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= 500,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(
        movie.year <= Utc::now().year(),
        "year",
        "must not be in the future",
    );

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(
        !movie.genres.is_empty(),
        "genres",
        "must contain at least 1 genre",
    );
    v.check(
        movie.genres.len() <= 5,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        unique(&movie.genres),
        "genres",
        "must not contain duplicate values",
    );
}

/// A registered account. The password hash and concurrency version never
/// appear in responses.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub version: i32,
}

/// Check the user's name and email, collecting all failures. Password
/// plaintext rules live with the hasher.
pub fn validate_user(v: &mut Validator, user: &User) {
    v.check(!user.name.is_empty(), "name", "must be provided");
    v.check(
        user.name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    validate_email(v, &user.email);
}

/// The scope a token was issued for. A token is only honored in its own scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    /// One-shot account activation
    Activation,
    /// Bearer authentication
    Authentication,
}

impl TokenScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }

    /// Issue lifetime for tokens of this scope.
    #[must_use]
    pub fn ttl(self) -> chrono::Duration {
        match self {
            TokenScope::Activation => chrono::Duration::hours(72),
            TokenScope::Authentication => chrono::Duration::hours(24),
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flat set of capability codes granted to a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    #[must_use]
    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|granted| granted == code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for Capabilities {
    fn from(codes: Vec<String>) -> Self {
        Capabilities(codes)
    }
}

impl FromIterator<String> for Capabilities {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Capabilities(iter.into_iter().collect())
    }
}

/// Paging and ordering parameters for list endpoints.
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// The column to order by, with any descending prefix stripped.
    ///
    /// The sort key is checked against the safelist again here so a filter
    /// that skipped validation cannot smuggle text into a query.
    pub fn sort_column(&self) -> Result<&str> {
        if self.sort_safelist.contains(&self.sort.as_str()) {
            Ok(self.sort.trim_start_matches('-'))
        } else {
            Err(Error::invariant(format!(
                "unsafe sort parameter: {}",
                self.sort
            )))
        }
    }

    #[must_use]
    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Check paging bounds and the sort key, collecting all failures.
pub fn validate_filters(v: &mut Validator, filters: &Filters) {
    v.check(filters.page > 0, "page", "must be greater than zero");
    v.check(
        filters.page <= 10_000_000,
        "page",
        "must be a maximum of 10 million",
    );
    v.check(
        filters.page_size > 0,
        "page_size",
        "must be greater than zero",
    );
    v.check(
        filters.page_size <= 100,
        "page_size",
        "must be a maximum of 100",
    );
    v.check(
        filters.sort_safelist.contains(&filters.sort.as_str()),
        "sort",
        "invalid sort value",
    );
}

/// Pagination details attached to list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl PageMetadata {
    /// Derive pagination details from a result count. An empty result set
    /// yields the zero value.
    #[must_use]
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return PageMetadata::default();
        }
        PageMetadata {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
