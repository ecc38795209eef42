use async_trait::async_trait;

use crate::attribute::Item;
use crate::schema::EntitySchema;

use super::{
    DeleteItem, GetItem, Page, PutItem, QueryRequest, Result, ScanRequest, StoreResult,
    TransactItem, WriteRequest,
};

/// A hash/range key-value store with secondary indexes.
///
/// Implementations translate these calls to a concrete backend and report
/// failures as [`StoreError`](super::StoreError) values; they never retry.
#[async_trait]
pub trait Store: Send + Sync {
    /// Provisions a table and the secondary indexes described by `schema`.
    async fn create_table(&self, table_name: &str, schema: &EntitySchema) -> StoreResult<()>;

    /// Writes one item, optionally under a precondition.
    async fn put_item(&self, request: PutItem) -> StoreResult<()>;

    /// Reads one item by its full primary key.
    async fn get_item(&self, request: GetItem) -> StoreResult<Option<Item>>;

    /// Deletes one item by its full primary key. Deleting an absent item succeeds.
    async fn delete_item(&self, request: DeleteItem) -> StoreResult<()>;

    /// Reads one page of a keyed query.
    async fn query(&self, request: QueryRequest) -> StoreResult<Page>;

    /// Reads one page of a full scan.
    async fn scan(&self, request: ScanRequest) -> StoreResult<Page>;

    /// Submits a batch of writes to one table.
    ///
    /// Returns the requests the store did not process.
    async fn batch_write(
        &self,
        table_name: &str,
        requests: Vec<WriteRequest>,
    ) -> StoreResult<Vec<WriteRequest>>;

    /// Applies every item atomically, or none of them.
    async fn transact_write(&self, items: Vec<TransactItem>) -> StoreResult<()>;
}

/// A modeled type persisted through the storage access layer.
///
/// `to_item` emits the declared attributes only; composite key attributes
/// are derived from the schema by the key codec.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The schema shared by every value of this type.
    fn schema() -> &'static EntitySchema;

    fn to_item(&self) -> Result<Item>;

    fn from_item(item: &Item) -> Result<Self>;

    /// Name used in errors and logs.
    fn entity_type() -> &'static str {
        Self::schema().entity.as_str()
    }
}

/// Throttles item delivery during queries and scans.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Waits until the next item may be delivered.
    async fn wait(&self);
}
