use thiserror::Error;

use super::NaturalKey;

/// Input problems detected before any request reaches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyHashKey { field: String },
    #[error("Missing value for key field {field}")]
    MissingField { field: String },
    #[error("Field {field} is not part of the key")]
    UnexpectedKeyField { field: String },
    #[error("Key field {field} must be of type {expected}, got {actual}")]
    KeyTypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{field} value {value:?} contains the separator {separator:?} reserved by {attribute}")]
    SeparatorInValue {
        attribute: String,
        field: String,
        value: String,
        separator: char,
    },
    #[error("{field} of type {actual} cannot be part of composite attribute {attribute}")]
    UnsupportedCompositeValue {
        attribute: String,
        field: String,
        actual: &'static str,
    },
    #[error("Cannot specify both StartingAt and StartingAfter")]
    ConflictingStartBounds,
    #[error("Index {index} has no range key to start at")]
    NoRangeKey { index: String },
    #[error("{entity_type} has no index named {index}")]
    UnknownIndex {
        entity_type: &'static str,
        index: String,
    },
    #[error("Batch of {received} items exceeds the limit of {allowed}")]
    BatchTooLarge { received: usize, allowed: usize },
    #[error("Transaction must contain between 1 and {allowed} items, got {received}")]
    TransactionSize { received: usize, allowed: usize },
}

/// Why a single item of a cancelled transaction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReason {
    /// Provider reason code, `None` when the item itself did not fail.
    pub code: Option<String>,
    pub message: Option<String>,
}

impl CancellationReason {
    pub const CONDITIONAL_CHECK_FAILED: &'static str = "ConditionalCheckFailed";

    /// Reason reported for items that did not cause the cancellation.
    pub fn none() -> Self {
        Self {
            code: Some("None".to_string()),
            message: None,
        }
    }

    pub fn condition_failed() -> Self {
        Self {
            code: Some(Self::CONDITIONAL_CHECK_FAILED.to_string()),
            message: Some("The conditional request failed".to_string()),
        }
    }

    /// Returns true when this item's precondition did not hold.
    pub fn is_condition_failure(&self) -> bool {
        self.code.as_deref() == Some(Self::CONDITIONAL_CHECK_FAILED)
    }
}

/// Errors surfaced by a [`Store`](super::Store) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Conditional check failed")]
    ConditionalCheckFailed,
    #[error("Transaction canceled ({} items)", .reasons.len())]
    TransactionCanceled { reasons: Vec<CancellationReason> },
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Resource in use: {0}")]
    ResourceInUse(String),
    #[error("Throughput exceeded, please retry: {0}")]
    Throttled(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Store request failed: {0}")]
    Service(String),
}

/// Whether the caller's own context stopped the operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    #[error("context cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Errors that can occur during storage access operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{entity_type} not found: {key}")]
    NotFound {
        entity_type: &'static str,
        key: NaturalKey,
    },
    #[error("{entity_type} already exists: {key}")]
    AlreadyExists {
        entity_type: &'static str,
        key: NaturalKey,
    },
    #[error("Transaction canceled: {}", describe_reasons(.reasons))]
    TransactionCanceled { reasons: Vec<CancellationReason> },
    #[error(transparent)]
    Provider(#[from] StoreError),
    #[error("Operation stopped: {0}")]
    Cancelled(CancelReason),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

fn describe_reasons(reasons: &[CancellationReason]) -> String {
    reasons
        .iter()
        .enumerate()
        .filter(|(_, reason)| reason.code.as_deref().is_some_and(|code| code != "None"))
        .map(|(i, reason)| format!("item {i}: {}", reason.code.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for storage access operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for raw store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
