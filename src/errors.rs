use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use thiserror::Error;

/// Error type shared by every engine service.
///
/// `InsufficientStock` is the only variant expected during normal operation;
/// callers branch on it to surface an out-of-stock condition rather than a
/// failure. Everything else indicates a bad reference or a persistence
/// problem.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Reservation error: {0}")]
    ReservationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Helper to convert database errors with consistent wrapping.
    pub fn db_error<E: Into<DbErr>>(error: E) -> Self {
        ServiceError::DatabaseError(error.into())
    }

    /// True for errors a caller is expected to handle as a business outcome
    /// rather than report as a bug.
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, ServiceError::InsufficientStock(_))
    }
}

/// Unwraps sea-orm's transaction wrapper so service methods can end with a
/// single `map_err(ServiceError::from)` after `db.transaction(...)`.
impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}
