//! Pure functions for mapping storage errors to HTTP status codes.
//!
//! Generated handlers sit at an HTTP boundary; this is the single place that
//! decides which status each [`Error`] variant becomes.

use super::{CancelReason, Error, StoreError};

/// Maps an [`Error`] to an HTTP status code.
///
/// - `Validation` -> 400 (Bad Request)
/// - `NotFound` -> 404 (Not Found)
/// - `AlreadyExists`, `TransactionCanceled` -> 409 (Conflict)
/// - `Provider(Throttled | Connection)` -> 503 (Service Unavailable)
/// - any other `Provider` error -> 500 (Internal Server Error)
/// - `Cancelled(DeadlineExceeded)` -> 504 (Gateway Timeout)
/// - `Cancelled(Cancelled)` -> 499 (client closed request)
/// - `Serialization`, `InvalidData` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use tablekit_core::storage::{error_to_status_code, Error, NaturalKey};
///
/// let error = Error::NotFound {
///     entity_type: "SimpleThing",
///     key: NaturalKey::new().with("name", "missing"),
/// };
/// assert_eq!(error_to_status_code(&error), 404);
/// ```
pub fn error_to_status_code(error: &Error) -> u16 {
    match error {
        Error::Validation(_) => 400,
        Error::NotFound { .. } => 404,
        Error::AlreadyExists { .. } => 409,
        Error::TransactionCanceled { .. } => 409,
        Error::Provider(StoreError::Throttled(_) | StoreError::Connection(_)) => 503,
        Error::Provider(_) => 500,
        Error::Cancelled(CancelReason::DeadlineExceeded) => 504,
        Error::Cancelled(CancelReason::Cancelled) => 499,
        Error::Serialization(_) => 500,
        Error::InvalidData(_) => 500,
    }
}
