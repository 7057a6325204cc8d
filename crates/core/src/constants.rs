//! Shared constants for the marquee workspace

/// Capability code required to browse the movie catalog.
pub const MOVIES_READ: &str = "movies:read";

/// Capability code required to create, edit, or delete catalog entries.
pub const MOVIES_WRITE: &str = "movies:write";

/// Capability codes seeded into a fresh database.
pub const SEEDED_CAPABILITIES: &[&str] = &[MOVIES_READ, MOVIES_WRITE];
