//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the [`Store`]
//! trait using `aws-sdk-dynamodb`.
//!
//! [`Store`]: tablekit_core::storage::Store

mod client;
mod conversions;
mod error;
mod provision;
mod store;

pub use client::{create_client, AwsConfig};
pub use store::DynamoDbStore;
