//! Account rows with optimistic concurrency control

use crate::db::{is_unique_violation, under_deadline};
use chrono::{DateTime, Utc};
use marquee_auth::{password, token};
use marquee_core::{Error, Result, TokenScope, User};
use sqlx::SqlitePool;
use tracing::debug;

/// Storage for registered accounts.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account, filling in its generated id, creation time, and
    /// version.
    pub async fn insert(&self, user: &mut User) -> Result<()> {
        let query = sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(
            "INSERT INTO users (name, email, password_hash, activated)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, created_at, version",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.activated);

        match under_deadline("users.insert", query.fetch_one(&self.pool)).await {
            Ok((id, created_at, version)) => {
                user.id = id;
                user.created_at = created_at;
                user.version = version;
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicateEmail),
            Err(err) => Err(err),
        }
    }

    /// Look up an account by email. The email column collates
    /// case-insensitively.
    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        let query = sqlx::query_as::<_, User>(
            "SELECT id, created_at, name, email, password_hash, activated, version
             FROM users
             WHERE email = ?1",
        )
        .bind(email);

        under_deadline("users.get_by_email", query.fetch_optional(&self.pool))
            .await?
            .ok_or_else(|| Error::not_found("user"))
    }

    /// Resolve the account holding an unexpired token in `scope`.
    ///
    /// An expired token is indistinguishable from one that was never issued.
    pub async fn get_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User> {
        let hash = token::hash_plaintext(plaintext);
        let query = sqlx::query_as::<_, User>(
            "SELECT users.id, users.created_at, users.name, users.email,
                    users.password_hash, users.activated, users.version
             FROM users
             INNER JOIN tokens ON tokens.user_id = users.id
             WHERE tokens.hash = ?1 AND tokens.scope = ?2 AND tokens.expiry > ?3",
        )
        .bind(hash)
        .bind(scope.as_str())
        .bind(Utc::now());

        under_deadline("users.get_for_token", query.fetch_optional(&self.pool))
            .await?
            .ok_or_else(|| Error::not_found("user"))
    }

    /// Resolve an account by email and password. The same opaque failure
    /// covers an unknown email and a wrong password.
    pub async fn get_by_credentials(&self, email: &str, password_plaintext: &str) -> Result<User> {
        let user = match self.get_by_email(email).await {
            Ok(user) => user,
            Err(Error::NotFound { .. }) => {
                debug!(email_known = false, "credential check failed");
                return Err(Error::InvalidCredentials);
            }
            Err(err) => return Err(err),
        };

        if password::verify(password_plaintext, &user.password_hash)? {
            Ok(user)
        } else {
            debug!(email_known = true, "credential check failed");
            Err(Error::InvalidCredentials)
        }
    }

    /// Write back a modified account if nobody else has touched the row since
    /// it was read. Bumps the version on success.
    pub async fn update(&self, user: &mut User) -> Result<()> {
        let query = sqlx::query_as::<_, (i32,)>(
            "UPDATE users
             SET name = ?1, email = ?2, password_hash = ?3, activated = ?4,
                 version = version + 1
             WHERE id = ?5 AND version = ?6
             RETURNING version",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.activated)
        .bind(user.id)
        .bind(user.version);

        match under_deadline("users.update", query.fetch_optional(&self.pool)).await {
            Ok(Some((version,))) => {
                user.version = version;
                Ok(())
            }
            Ok(None) => Err(Error::edit_conflict("user")),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicateEmail),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn insert_fills_generated_fields() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.version, 1);
        assert!((Utc::now() - user.created_at).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn insert_round_trips_through_get_by_email() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let fetched = stores.users.get_by_email("alice@example.com").await.unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let (_dir, stores) = testutil::stores().await;
        let mut first = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut first).await.unwrap();

        let mut second = testutil::sample_user("Alice@Example.COM");
        let err = stores.users.insert(&mut second).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (_dir, stores) = testutil::stores().await;
        let err = stores.users.get_by_email("ghost@example.com").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_bumps_the_version() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        user.activated = true;
        stores.users.update(&mut user).await.unwrap();
        assert_eq!(user.version, 2);

        let fetched = stores.users.get_by_email("alice@example.com").await.unwrap();
        assert!(fetched.activated);
        assert_eq!(fetched.version, 2);
    }

    #[tokio::test]
    async fn stale_update_is_an_edit_conflict() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let mut fresh = stores.users.get_by_email("alice@example.com").await.unwrap();
        let mut stale = fresh.clone();

        fresh.name = "First Writer".to_string();
        stores.users.update(&mut fresh).await.unwrap();

        stale.name = "Second Writer".to_string();
        let err = stores.users.update(&mut stale).await.unwrap_err();
        assert!(matches!(err, Error::EditConflict { .. }));
    }

    #[tokio::test]
    async fn credentials_resolve_the_right_user() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let resolved = stores
            .users
            .get_by_credentials("alice@example.com", "pa55word1234")
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let wrong_password = stores
            .users
            .get_by_credentials("alice@example.com", "not-the-password")
            .await
            .unwrap_err();
        let unknown_email = stores
            .users
            .get_by_credentials("ghost@example.com", "pa55word1234")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, Error::InvalidCredentials));
        assert!(matches!(unknown_email, Error::InvalidCredentials));
    }
}
