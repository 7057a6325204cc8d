//! SQLite-backed persistence for marquee
//!
//! Every read and write runs under a per-operation deadline and reports its
//! outcome through the shared error taxonomy, so callers branch on typed
//! results instead of driver errors.
//!
//! ## Key Components
//!
//! - **db**: Pool construction, schema bootstrap, and the query deadline
//! - **users**: Account rows with optimistic concurrency control
//! - **tokens**: Hashed credential rows and scope-wide revocation
//! - **permissions**: Capability grants
//! - **movies**: The catalog, including filtered and paginated listing

pub mod db;
pub mod movies;
pub mod permissions;
pub mod tokens;
pub mod users;

pub use db::{open_pool, QUERY_TIMEOUT};
pub use movies::MovieStore;
pub use permissions::PermissionStore;
pub use tokens::TokenStore;
pub use users::UserStore;

/// All stores sharing one connection pool.
#[derive(Clone)]
pub struct Stores {
    pub users: UserStore,
    pub tokens: TokenStore,
    pub permissions: PermissionStore,
    pub movies: MovieStore,
}

impl Stores {
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            users: UserStore::new(pool.clone()),
            tokens: TokenStore::new(pool.clone()),
            permissions: PermissionStore::new(pool.clone()),
            movies: MovieStore::new(pool),
        }
    }
}
