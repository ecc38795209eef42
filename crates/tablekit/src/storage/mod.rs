//! Store backend implementations.
//!
//! This module provides concrete implementations of the [`Store`] trait
//! defined in `tablekit_core::storage`. Backends are selected at compile time
//! via feature flags and can be enabled side by side.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory store for tests and development
//! - `dynamodb`: AWS DynamoDB store using `aws-sdk-dynamodb`
//!
//! [`Store`]: tablekit_core::storage::Store

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::{AwsConfig, DynamoDbStore};
