//! Capability grants

use crate::db::under_deadline;
use marquee_core::{Capabilities, Result};
use sqlx::SqlitePool;

/// Storage for the capability codes held by each principal.
#[derive(Clone)]
pub struct PermissionStore {
    pool: SqlitePool,
}

impl PermissionStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every capability code granted to `user_id`.
    pub async fn get_all_for_user(&self, user_id: i64) -> Result<Capabilities> {
        let query = sqlx::query_as::<_, (String,)>(
            "SELECT permissions.code
             FROM permissions
             INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
             WHERE users_permissions.user_id = ?1
             ORDER BY permissions.code",
        )
        .bind(user_id);

        let rows =
            under_deadline("permissions.get_all_for_user", query.fetch_all(&self.pool)).await?;
        Ok(rows.into_iter().map(|(code,)| code).collect())
    }

    /// Grant the listed capability codes to `user_id`. Codes already granted,
    /// and codes not present in the permissions table, are skipped.
    pub async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<()> {
        for code in codes {
            let query = sqlx::query(
                "INSERT OR IGNORE INTO users_permissions (user_id, permission_id)
                 SELECT ?1, id FROM permissions WHERE code = ?2",
            )
            .bind(user_id)
            .bind(code);

            under_deadline("permissions.grant", query.execute(&self.pool)).await?;
        }
        Ok(())
    }
}
