//! Core types and functionality for marquee
//!
//! This crate provides the foundational domain types, error handling, and
//! input validation used throughout the marquee workspace.
//!
//! ## Key Components
//!
//! - **Types**: Movies, users, capabilities, and listing filters
//! - **Errors**: The shared error taxonomy with typed storage outcomes
//! - **Validation**: A collecting validator that reports every failed field

pub mod constants;
pub mod errors;
pub mod types;
pub mod validation;

pub use errors::{Error, Result};
pub use types::{
    validate_filters, validate_movie, validate_user, Capabilities, Filters, Movie, PageMetadata,
    Runtime, TokenScope, User,
};
pub use validation::{validate_email, Validator};
