//! Hashed credential rows and scope-wide revocation

use crate::db::under_deadline;
use chrono::Duration;
use marquee_auth::token::{self, Token};
use marquee_core::{Result, TokenScope};
use sqlx::SqlitePool;

/// Storage for token digests. Plaintexts never reach this layer's tables.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a token for `user_id` and persist its digest row.
    pub async fn create(&self, user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Token> {
        let token = token::issue(user_id, ttl, scope)?;
        self.insert(&token).await?;
        Ok(token)
    }

    /// Persist a token's digest row.
    pub async fn insert(&self, token: &Token) -> Result<()> {
        let query = sqlx::query(
            "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&token.hash)
        .bind(token.user_id)
        .bind(token.expiry)
        .bind(token.scope.as_str());

        under_deadline("tokens.insert", query.execute(&self.pool)).await?;
        Ok(())
    }

    /// Revoke every token `user_id` holds in `scope`.
    pub async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> Result<()> {
        let query = sqlx::query("DELETE FROM tokens WHERE scope = ?1 AND user_id = ?2")
            .bind(scope.as_str())
            .bind(user_id);

        under_deadline("tokens.delete_all_for_user", query.execute(&self.pool)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    /// A different but same-length plaintext, for tamper tests.
    fn altered(plaintext: &str) -> String {
        let replacement = if plaintext.starts_with('A') { "B" } else { "A" };
        format!("{replacement}{}", &plaintext[1..])
    }

    #[tokio::test]
    async fn stored_token_resolves_its_user() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let token = stores
            .tokens
            .create(user.id, Duration::hours(24), TokenScope::Authentication)
            .await
            .unwrap();

        let resolved = stores
            .users
            .get_for_token(TokenScope::Authentication, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn expired_token_is_not_found() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        // A negative ttl puts the expiry in the past at insert time.
        let token = stores
            .tokens
            .create(user.id, Duration::hours(-1), TokenScope::Activation)
            .await
            .unwrap();

        let err = stores
            .users
            .get_for_token(TokenScope::Activation, &token.plaintext)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn token_is_only_honored_in_its_own_scope() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let token = stores
            .tokens
            .create(user.id, Duration::hours(72), TokenScope::Activation)
            .await
            .unwrap();

        let err = stores
            .users
            .get_for_token(TokenScope::Authentication, &token.plaintext)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn tampered_plaintext_is_not_found() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let token = stores
            .tokens
            .create(user.id, Duration::hours(24), TokenScope::Authentication)
            .await
            .unwrap();

        let err = stores
            .users
            .get_for_token(TokenScope::Authentication, &altered(&token.plaintext))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn revocation_removes_only_the_named_scope() {
        let (_dir, stores) = testutil::stores().await;
        let mut user = testutil::sample_user("alice@example.com");
        stores.users.insert(&mut user).await.unwrap();

        let activation = stores
            .tokens
            .create(user.id, Duration::hours(72), TokenScope::Activation)
            .await
            .unwrap();
        let authentication = stores
            .tokens
            .create(user.id, Duration::hours(24), TokenScope::Authentication)
            .await
            .unwrap();

        stores
            .tokens
            .delete_all_for_user(TokenScope::Activation, user.id)
            .await
            .unwrap();

        let gone = stores
            .users
            .get_for_token(TokenScope::Activation, &activation.plaintext)
            .await;
        assert!(gone.is_err());

        let kept = stores
            .users
            .get_for_token(TokenScope::Authentication, &authentication.plaintext)
            .await;
        assert!(kept.is_ok());
    }
}
