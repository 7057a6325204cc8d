//! Route handlers for the `/v1` surface.
//!
//! Handlers stay thin: read the request, validate, call into the
//! stores, wrap the result in its JSON envelope. Admission policy lives
//! in the guard chain, refusal policy in [`crate::errors`].

pub mod healthcheck;
pub mod movies;
pub mod tokens;
pub mod users;
