//! Error taxonomy for the table editor.
//!
//! Precondition errors are raised before any statement reaches the executor.
//! Transport and database errors carry the raw message so it can be shown to the user verbatim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    /// Update/delete need a primary key to address rows.
    #[error("Table {schema}.{table} has no primary key")]
    MissingPrimaryKey { schema: String, table: String },

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Unknown column '{column}' on table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("No columns to update")]
    EmptyUpdate,

    /// The executor answered but the database rejected the statement.
    #[error("{0}")]
    Database(String),

    /// The executor could not be reached or answered with something unreadable.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

impl EditorError {
    /// Precondition failures are the caller's fault and never worth retrying.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EditorError::MissingPrimaryKey { .. }
                | EditorError::TableNotFound(_)
                | EditorError::UnknownColumn { .. }
                | EditorError::EmptyUpdate
        )
    }

    /// Only transport-level failures and timeouts are retried, and only for reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EditorError::Transport(_) | EditorError::Timeout(_))
    }
}

impl From<reqwest::Error> for EditorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EditorError::Decode(e.to_string())
        } else {
            EditorError::Transport(e.to_string())
        }
    }
}

impl From<sqlx::Error> for EditorError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => EditorError::Database(db.message().to_string()),
            sqlx::Error::Io(io) => EditorError::Transport(io.to_string()),
            err @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                EditorError::Transport(err.to_string())
            }
            other => EditorError::Database(other.to_string()),
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_message_is_verbatim() {
        let err = EditorError::Database(
            "duplicate key value violates unique constraint \"users_email_key\"".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint \"users_email_key\""
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn classification() {
        assert!(EditorError::EmptyUpdate.is_precondition());
        assert!(EditorError::Timeout(10).is_retryable());
        assert!(!EditorError::Transport("down".into()).is_precondition());
    }
}
