//! Error type shared by the persistence layer and the background worker.
//!
//! Every data-access function returns [`Result`], so callers can tell a bad
//! password apart from a constraint violation or a dead connection. The UI
//! only ever shows the `Display` text, which is why each message is written
//! to be read by the person at the keyboard.

use rusqlite::{Error as SqlError, ErrorCode};
use thiserror::Error;

pub type Result<T, E = LibraryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// The SQLite file could not be opened (or prepared) at all.
    #[error("Database connection failed: {0}")]
    Connection(#[source] SqlError),

    #[error("{action}: {source}")]
    Database {
        action: &'static str,
        #[source]
        source: SqlError,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{entity} with ID {id} was not found.")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Background task '{0}' stopped before reporting a result.")]
    Worker(&'static str),

    #[error("The database handle is unusable after a panic in another task.")]
    Poisoned,
}

impl LibraryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub(crate) fn is_constraint(err: &SqlError) -> bool {
    matches!(err.sqlite_error_code(), Some(ErrorCode::ConstraintViolation))
}

/// `anyhow::Context`-style labelling for raw `rusqlite` results.
pub trait DbResultExt<T> {
    fn db_context(self, action: &'static str) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, SqlError> {
    fn db_context(self, action: &'static str) -> Result<T> {
        self.map_err(|source| LibraryError::Database { action, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_context_labels_the_action() {
        let raw: std::result::Result<(), SqlError> = Err(SqlError::QueryReturnedNoRows);
        let err = raw.db_context("failed to load books").unwrap_err();
        assert!(err.to_string().starts_with("failed to load books: "));
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = LibraryError::NotFound {
            entity: "Book",
            id: 42,
        };
        assert_eq!(err.to_string(), "Book with ID 42 was not found.");
    }
}
