/// Result type alias for marquee operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for marquee operations
///
/// Storage lookups and writes report their typed outcomes here so callers can
/// branch on them without inspecting driver errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Lookup matched no record. Expired tokens surface here as well,
    /// indistinguishable from tokens that were never issued.
    #[error("{entity} not found")]
    NotFound { entity: String },

    /// A versioned update matched no row: the record changed between this
    /// caller's read and its write.
    #[error("edit conflict while updating {entity}")]
    EditConflict { entity: String },

    /// The email address is already registered to another user.
    #[error("a user with this email address already exists")]
    DuplicateEmail,

    /// The email/password pair did not resolve to a user. Deliberately carries
    /// no detail about which half failed.
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// A state the program promises cannot occur, such as an unparseable
    /// stored password hash or an unsafelisted sort key.
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Database errors not covered by a typed outcome above
    #[error("database error: {source}")]
    Database {
        #[source]
        source: sqlx::Error,
    },

    /// I/O errors
    #[error("i/o error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// Conversion implementations
impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Error::Database { source: error }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io { source: error }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a not-found error for the named entity
    #[must_use]
    pub fn not_found(entity: impl Into<String>) -> Self {
        Error::NotFound {
            entity: entity.into(),
        }
    }

    /// Create an edit-conflict error for the named entity
    #[must_use]
    pub fn edit_conflict(entity: impl Into<String>) -> Self {
        Error::EditConflict {
            entity: entity.into(),
        }
    }

    /// Create an invariant-violation error
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a timeout error for the named operation
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// True when the error is the not-found outcome
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_the_entity() {
        let err = Error::not_found("movie");
        assert_eq!(err.to_string(), "movie not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn edit_conflict_display_names_the_entity() {
        let err = Error::edit_conflict("user");
        assert_eq!(err.to_string(), "edit conflict while updating user");
        assert!(!err.is_not_found());
    }

    #[test]
    fn timeout_display_includes_operation_and_duration() {
        let err = Error::timeout("movies.get", std::time::Duration::from_secs(3));
        assert!(err.to_string().contains("movies.get"));
        assert!(err.to_string().contains("3s"));
    }

    #[test]
    fn io_errors_convert_into_the_io_variant() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::from(io);
        assert!(matches!(err, Error::Io { .. }));
    }
}
