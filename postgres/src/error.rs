//! Mapping from `sqlx` failures to [`StoreError`].
//!
//! The split that matters is whether a statement may have run:
//! a failure on an established connection is `Transport` (unknown outcome),
//! while pool exhaustion means nothing was sent (`Unavailable`).

use admission_core::StoreError;

/// `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// Classify a `sqlx` error for the engine.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Configuration(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
            StoreError::Transport(err.to_string())
        }
        sqlx::Error::WorkerCrashed => StoreError::Transport(err.to_string()),
        sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some(QUERY_CANCELED) => {
            StoreError::Timeout
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(err.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

/// Whether `err` is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn broken_connection_is_indeterminate() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let mapped = map_sqlx_error(sqlx::Error::Io(io));
        assert!(matches!(mapped, StoreError::Transport(_)));
        assert!(mapped.is_indeterminate());

        let protocol = map_sqlx_error(sqlx::Error::Protocol("unexpected message".into()));
        assert!(protocol.is_indeterminate());
    }

    #[test]
    fn missing_row_is_a_database_error() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
