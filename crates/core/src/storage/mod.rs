mod error;
mod http_mapping;
mod traits;
mod types;

pub use error::{
    CancelReason, CancellationReason, Error, Result, StoreError, StoreResult, ValidationError,
};
pub use http_mapping::error_to_status_code;
pub use traits::{Entity, RateLimiter, Store};
pub use types::{
    DeleteItem, GetItem, NaturalKey, Page, PutItem, QueryRequest, ScanRequest, TransactItem,
    WriteRequest,
};
