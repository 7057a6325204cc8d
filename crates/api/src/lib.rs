//! HTTP surface for the marquee movie-catalog service.
//!
//! Everything request-shaped lives here: the axum router, the guard
//! chain that every request passes through before reaching a handler,
//! the JSON error envelope, and the background mail dispatcher. The
//! binary in `main.rs` wires these together with the store, limiter,
//! and auth crates.
//!
//! ## Key Components
//!
//! - `config`: command-line flags parsed with clap
//! - `errors`: the `ApiError` taxonomy and its JSON responses
//! - `guards`: panic containment, rate limiting, authentication, and
//!   capability enforcement middleware
//! - `handlers`: the `/v1` route handlers
//! - `mail`: the `Mailer` trait and the bounded dispatch queue
//! - `router`: assembles handlers and guards into the final `Router`

pub mod config;
pub mod errors;
pub mod guards;
pub mod handlers;
pub mod mail;
pub mod router;
pub mod state;

pub use config::Config;
pub use errors::{ApiError, ApiResult};
pub use state::AppState;
