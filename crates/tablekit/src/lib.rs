//! Typed storage access layer over hash/range key-value stores.
//!
//! One generic engine serves every modeled entity: a [`Table`] encodes keys
//! through the codec in [`tablekit_core`], enforces create-vs-upsert
//! semantics, and runs queries, scans, batches and transactions against any
//! [`Store`] backend.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory backend with DynamoDB-like semantics
//! - `dynamodb`: AWS DynamoDB backend using `aws-sdk-dynamodb`, plus the
//!   `tablekit` provisioning CLI

mod batch;
mod config;
mod database;
mod limiter;
mod pager;
mod query;
mod scan;
mod table;
mod transaction;

pub mod storage;

#[cfg(test)]
mod fixtures;

pub use batch::MAX_BATCH_ITEMS;
pub use config::{Config, DEFAULT_PAGE_SIZE};
pub use database::Database;
pub use limiter::IntervalLimiter;
pub use pager::ItemStream;
pub use query::QueryInput;
pub use scan::ScanInput;
pub use table::{Table, Uniqueness};
pub use transaction::{Transaction, MAX_TRANSACTION_ITEMS};

pub use tablekit_core::attribute::{AttributeValue, Item};
pub use tablekit_core::condition::Condition;
pub use tablekit_core::context::{CancelHandle, Context};
pub use tablekit_core::schema::EntitySchema;
pub use tablekit_core::storage::{
    error_to_status_code, CancelReason, CancellationReason, Entity, Error, NaturalKey,
    RateLimiter, Result, Store, StoreError, ValidationError,
};
