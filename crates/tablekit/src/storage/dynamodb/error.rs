//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `tablekit_core::storage`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use tablekit_core::storage::{CancellationReason, StoreError};

/// Requests that never got a response from the service.
fn connection_error<E, R>(err: &SdkError<E, R>) -> Option<StoreError>
where
    E: std::error::Error + 'static,
    R: Debug,
{
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            Some(StoreError::Connection(err.to_string()))
        }
        _ => None,
    }
}

fn throttled(what: &str) -> StoreError {
    StoreError::Throttled(what.to_string())
}

fn internal() -> StoreError {
    StoreError::Service("DynamoDB internal server error".to_string())
}

/// Map a CreateTable SDK error to StoreError.
pub fn map_create_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<CreateTableError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        CreateTableError::ResourceInUseException(e) => {
            StoreError::ResourceInUse(e.message().unwrap_or("Table already exists").to_string())
        }
        CreateTableError::LimitExceededException(_) => throttled("Table operation limit exceeded"),
        CreateTableError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("CreateTable failed: {:?}", err)),
    }
}

/// Map a DescribeTable SDK error to StoreError.
pub fn map_describe_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DescribeTableError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        DescribeTableError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        DescribeTableError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("DescribeTable failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to StoreError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => StoreError::ConditionalCheckFailed,
        PutItemError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        PutItemError::ProvisionedThroughputExceededException(_) => {
            throttled("Throughput exceeded")
        }
        PutItemError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        PutItemError::TransactionConflictException(_) => {
            StoreError::Service("Transaction conflict, please retry".to_string())
        }
        PutItemError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("PutItem failed: {:?}", err)),
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        GetItemError::ProvisionedThroughputExceededException(_) => {
            throttled("Throughput exceeded")
        }
        GetItemError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        GetItemError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a DeleteItem SDK error to StoreError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => StoreError::ConditionalCheckFailed,
        DeleteItemError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        DeleteItemError::ProvisionedThroughputExceededException(_) => {
            throttled("Throughput exceeded")
        }
        DeleteItemError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        DeleteItemError::TransactionConflictException(_) => {
            StoreError::Service("Transaction conflict, please retry".to_string())
        }
        DeleteItemError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("DeleteItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(err: SdkError<QueryError, R>) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        QueryError::ProvisionedThroughputExceededException(_) => throttled("Throughput exceeded"),
        QueryError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        QueryError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("Query failed: {:?}", err)),
    }
}

/// Map a Scan SDK error to StoreError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(err: SdkError<ScanError, R>) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        ScanError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        ScanError::ProvisionedThroughputExceededException(_) => throttled("Throughput exceeded"),
        ScanError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        ScanError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("Scan failed: {:?}", err)),
    }
}

/// Map a BatchWriteItem SDK error to StoreError.
pub fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        BatchWriteItemError::ProvisionedThroughputExceededException(_) => {
            throttled("Throughput exceeded")
        }
        BatchWriteItemError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        BatchWriteItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Service("Item collection size limit exceeded".to_string())
        }
        BatchWriteItemError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("BatchWriteItem failed: {:?}", err)),
    }
}

/// Map a TransactWriteItems SDK error to StoreError.
///
/// A cancelled transaction carries one reason per submitted item.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
) -> StoreError {
    if let Some(error) = connection_error(&err) {
        return error;
    }
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(e) => {
            StoreError::TransactionCanceled {
                reasons: e
                    .cancellation_reasons()
                    .iter()
                    .map(|reason| CancellationReason {
                        code: reason.code().map(str::to_string),
                        message: reason.message().map(str::to_string),
                    })
                    .collect(),
            }
        }
        TransactWriteItemsError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("Table not found").to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            throttled("Throughput exceeded")
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => throttled("Request limit exceeded"),
        TransactWriteItemsError::TransactionInProgressException(_) => {
            StoreError::Service("Transaction already in progress".to_string())
        }
        TransactWriteItemsError::InternalServerError(_) => internal(),
        err => StoreError::Service(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Map an SDK builder error to StoreError.
pub fn map_build_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Service(format!("Invalid request: {err}"))
}
