//! Pool construction, schema bootstrap, and the per-operation deadline

use marquee_core::constants::SEEDED_CAPABILITIES;
use marquee_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Deadline applied to every individual storage operation.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Timestamps default to RFC 3339 UTC so string comparison stays
/// chronological and decoding is unambiguous.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        name TEXT NOT NULL,
        email TEXT NOT NULL COLLATE NOCASE UNIQUE,
        password_hash TEXT NOT NULL,
        activated INTEGER NOT NULL DEFAULT 0,
        version INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS tokens (
        hash BLOB NOT NULL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        expiry TEXT NOT NULL,
        scope TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS permissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS users_permissions (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, permission_id)
    )",
    "CREATE TABLE IF NOT EXISTS movies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        title TEXT NOT NULL,
        year INTEGER NOT NULL,
        runtime INTEGER NOT NULL,
        genres TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1
    )",
];

/// Open the database at `path`, creating the file and any missing parent
/// directories, then bootstrap the schema and capability seed rows.
pub async fn open_pool(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    bootstrap(&pool).await?;
    debug!(path = %path.display(), "database ready");
    Ok(pool)
}

async fn bootstrap(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        under_deadline("schema.bootstrap", sqlx::query(statement).execute(pool)).await?;
    }
    for code in SEEDED_CAPABILITIES {
        under_deadline(
            "schema.seed_capabilities",
            sqlx::query("INSERT OR IGNORE INTO permissions (code) VALUES (?1)")
                .bind(code)
                .execute(pool),
        )
        .await?;
    }
    Ok(())
}

/// Run one storage operation under [`QUERY_TIMEOUT`].
pub(crate) async fn under_deadline<T, F>(operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::timeout(operation, QUERY_TIMEOUT)),
    }
}

/// True when the wrapped driver error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &Error) -> bool {
    matches!(
        err,
        Error::Database {
            source: sqlx::Error::Database(db),
        } if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_pool_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("data").join("nested").join("marquee.db");
        let pool = open_pool(&nested).await.unwrap();
        assert!(nested.exists());
        drop(pool);
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marquee.db");
        let first = open_pool(&path).await.unwrap();
        drop(first);
        // Reopening the same file replays the schema without error.
        let second = open_pool(&path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM permissions")
            .fetch_one(&second)
            .await
            .unwrap();
        assert_eq!(count, SEEDED_CAPABILITIES.len() as i64);
    }

    #[tokio::test]
    async fn capability_seed_rows_are_present() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(&dir.path().join("marquee.db")).await.unwrap();
        let codes: Vec<(String,)> = sqlx::query_as("SELECT code FROM permissions ORDER BY code")
            .fetch_all(&pool)
            .await
            .unwrap();
        let codes: Vec<&str> = codes.iter().map(|(code,)| code.as_str()).collect();
        assert_eq!(codes, vec!["movies:read", "movies:write"]);
    }
}
