//! In-memory storage backend for testing.
//!
//! Tables live in `Arc<RwLock<_>>`-guarded maps with the ordering, paging,
//! projection and conditional-write behavior of DynamoDB. Data is not
//! persisted and is lost when the store is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablekit::storage::InMemoryStore;
//!
//! let store = InMemoryStore::new().with_page_size(2);
//! // Use store for testing...
//! ```

mod store;

pub use store::InMemoryStore;
